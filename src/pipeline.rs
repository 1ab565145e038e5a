//! 문서 QA 파이프라인
//!
//! 인제스트: 경로 → 수집 → 텍스트 추출 → 청킹 → 두 백엔드 인덱스 빌드 → 기록
//! 질의: 질문 + 백엔드 → 검색 → 답변
//!
//! 두 흐름은 디스크의 인덱스 외에는 상태를 공유하지 않습니다.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::backend::{Backend, PerBackend};
use crate::collector::{CollectionStats, FileCollector};
use crate::config::{OcrEngineKind, PipelineConfig};
use crate::embedding::{EmbeddingProvider, GeminiEmbedding, LocalEmbedding};
use crate::extractor::{
    ExtractionStats, GeminiVisionOcr, OcrEngine, PageRasterizer, PdftoppmRasterizer, TesseractOcr,
    TextExtractor,
};
use crate::knowledge::{
    recursive_chunker, Answerer, Chunker, GroundedAnswer, IndexLayout, IndexSummary, Indexer,
    IngestLedger, NewIngestRun,
};
use crate::llm::{ChatModel, GeminiChat, GroqChat};

// ============================================================================
// Process Outcome
// ============================================================================

/// 인제스트 결과
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// 어떤 파일에서도 텍스트를 얻지 못함
    NoText { extraction: ExtractionStats },
    /// 텍스트는 있지만 청크가 없음
    NoChunks { extraction: ExtractionStats },
    /// 두 백엔드 인덱스 빌드 완료
    Indexed {
        run_id: i64,
        char_count: usize,
        chunk_count: usize,
        extraction: ExtractionStats,
        indices: Vec<IndexSummary>,
    },
}

impl ProcessOutcome {
    pub fn is_indexed(&self) -> bool {
        matches!(self, ProcessOutcome::Indexed { .. })
    }

    pub fn extraction(&self) -> &ExtractionStats {
        match self {
            ProcessOutcome::NoText { extraction }
            | ProcessOutcome::NoChunks { extraction }
            | ProcessOutcome::Indexed { extraction, .. } => extraction,
        }
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::NoText { .. } => write!(f, "No text could be extracted from the files."),
            ProcessOutcome::NoChunks { .. } => write!(f, "No valid text chunks could be extracted."),
            ProcessOutcome::Indexed { .. } => write!(f, "Files processed successfully"),
        }
    }
}

// ============================================================================
// Document Pipeline
// ============================================================================

/// 파이프라인 구성 요소
pub struct PipelineParts {
    pub index_root: PathBuf,
    pub extractor: TextExtractor,
    pub chunker: Box<dyn Chunker>,
    pub embedders: PerBackend<Arc<dyn EmbeddingProvider>>,
    pub models: PerBackend<Arc<dyn ChatModel>>,
    pub top_k: usize,
    pub temperature: f32,
}

/// 문서 QA 파이프라인
pub struct DocumentPipeline {
    collector: FileCollector,
    extractor: TextExtractor,
    chunker: Box<dyn Chunker>,
    indexer: Indexer,
    answerer: Answerer,
    ledger: IngestLedger,
}

impl DocumentPipeline {
    /// 구성 요소로 생성
    pub fn new(parts: PipelineParts) -> Result<Self> {
        let layout = IndexLayout::new(parts.index_root.clone());
        let ledger = IngestLedger::open_in(&parts.index_root).context("Failed to open ingest ledger")?;

        Ok(Self {
            collector: FileCollector::with_defaults(),
            extractor: parts.extractor,
            chunker: parts.chunker,
            indexer: Indexer::new(layout.clone(), parts.embedders.clone()),
            answerer: Answerer::new(
                layout,
                parts.embedders,
                parts.models,
                parts.top_k,
                parts.temperature,
            ),
            ledger,
        })
    }

    /// 설정에서 실제 클라이언트로 생성
    ///
    /// API 키는 여기서 요구하지 않고, 실제 호출 시점에 확인합니다.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        let ocr: Arc<dyn OcrEngine> = match config.ocr.engine {
            OcrEngineKind::Tesseract => Arc::new(TesseractOcr::new(
                config.ocr.tesseract_cmd.clone(),
                config.ocr.tesseract_lang.clone(),
            )),
            OcrEngineKind::Gemini => Arc::new(GeminiVisionOcr::new(
                config.gemini.api_key.clone(),
                &config.gemini.chat_model,
            )?),
        };
        let rasterizer: Arc<dyn PageRasterizer> = Arc::new(PdftoppmRasterizer::new(
            config.ocr.pdftoppm_cmd.clone(),
            config.ocr.render_dpi,
        ));

        let embedders: PerBackend<Arc<dyn EmbeddingProvider>> = PerBackend::new(
            Arc::new(GeminiEmbedding::from_settings(&config.gemini)?),
            Arc::new(LocalEmbedding::new(&config.local_embedding_model)?),
        );
        let models: PerBackend<Arc<dyn ChatModel>> = PerBackend::new(
            Arc::new(GeminiChat::from_settings(&config.gemini)?),
            Arc::new(GroqChat::from_settings(&config.groq)?),
        );

        Self::new(PipelineParts {
            index_root: config.index_root.clone(),
            extractor: TextExtractor::new(ocr, rasterizer),
            chunker: recursive_chunker(config.chunk.clone()),
            embedders,
            models,
            top_k: config.top_k,
            temperature: config.gemini.temperature,
        })
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    pub fn ledger(&self) -> &IngestLedger {
        &self.ledger
    }

    /// 문서 인제스트
    ///
    /// 텍스트나 청크가 없으면 인덱스를 건드리지 않고 해당 결과를 돌려줍니다.
    pub async fn process_files(&self, paths: &[PathBuf]) -> Result<ProcessOutcome> {
        let documents = self.collector.collect(paths)?;
        let collected = CollectionStats::from_documents(&documents);
        tracing::info!(
            "Processing {} files ({} pdf, {} image)",
            collected.total_files,
            collected.pdf_files,
            collected.image_files
        );

        let extracted = self.extractor.extract(&documents).await;
        if extracted.is_blank() {
            tracing::warn!("No text extracted from {} files", documents.len());
            return Ok(ProcessOutcome::NoText {
                extraction: extracted.stats,
            });
        }

        let chunks = self.chunker.chunk(&extracted.text);
        if chunks.is_empty() {
            return Ok(ProcessOutcome::NoChunks {
                extraction: extracted.stats,
            });
        }
        tracing::info!(
            "Split {} chars into {} chunks ({})",
            extracted.text.chars().count(),
            chunks.len(),
            self.chunker.name()
        );

        let indices = self.indexer.build_all(&chunks).await?;

        let char_count = extracted.text.chars().count();
        let run_id = self.ledger.record_run(&NewIngestRun {
            files: documents
                .iter()
                .map(|d| d.path.display().to_string())
                .collect(),
            char_count,
            chunk_count: chunks.len(),
            backends: indices.iter().map(|s| s.backend).collect(),
        })?;

        Ok(ProcessOutcome::Indexed {
            run_id,
            char_count,
            chunk_count: chunks.len(),
            extraction: extracted.stats,
            indices,
        })
    }

    /// 백엔드 이름 문자열로 질의 (`gemini` | `groq`)
    pub async fn ask_question(&self, question: &str, backend: &str) -> Result<String> {
        let backend: Backend = backend.parse()?;
        self.ask(question, backend).await
    }

    pub async fn ask(&self, question: &str, backend: Backend) -> Result<String> {
        self.answerer.answer(question, backend).await
    }

    /// 답변과 함께 문맥 청크 반환
    pub async fn ask_with_sources(&self, question: &str, backend: Backend) -> Result<GroundedAnswer> {
        self.answerer.answer_with_sources(question, backend).await
    }

    /// 인덱스와 인제스트 기록 삭제
    pub async fn clear(&self) -> Result<usize> {
        let removed = self.indexer.clear().await?;
        let runs = self.ledger.clear()?;
        tracing::info!("Cleared {} indices and {} ingest records", removed, runs);
        Ok(removed)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{classify, PipelineError};
    use crate::extractor::RasterImage;
    use crate::knowledge::ChunkConfig;
    use crate::testing::{write_pdf, EchoChat, KeywordEmbedding};
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    /// 이미지 바이트를 텍스트로 간주하는 OCR
    struct BytesOcr;

    #[async_trait]
    impl OcrEngine for BytesOcr {
        async fn recognize(&self, image: &RasterImage) -> Result<String> {
            Ok(String::from_utf8_lossy(&image.data).into_owned())
        }

        fn name(&self) -> &str {
            "bytes"
        }
    }

    struct NoRasterizer;

    #[async_trait]
    impl PageRasterizer for NoRasterizer {
        async fn rasterize(&self, _pdf: &Path, _page_number: u32) -> Result<RasterImage> {
            anyhow::bail!("rasterizer unavailable")
        }
    }

    fn pipeline(root: &Path) -> DocumentPipeline {
        DocumentPipeline::new(PipelineParts {
            index_root: root.to_path_buf(),
            extractor: TextExtractor::new(Arc::new(BytesOcr), Arc::new(NoRasterizer)),
            chunker: recursive_chunker(ChunkConfig::new(80, 10)),
            embedders: PerBackend::new(
                Arc::new(KeywordEmbedding::new(64)) as Arc<dyn EmbeddingProvider>,
                Arc::new(KeywordEmbedding::new(32)) as Arc<dyn EmbeddingProvider>,
            ),
            models: PerBackend::new(
                Arc::new(EchoChat::default()) as Arc<dyn ChatModel>,
                Arc::new(EchoChat::default()) as Arc<dyn ChatModel>,
            ),
            top_k: 4,
            temperature: 0.3,
        })
        .unwrap()
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_paris_end_to_end() {
        let docs = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let pdf = docs.path().join("paris.pdf");
        write_pdf(&pdf, &[Some("The capital of France is Paris.")]).unwrap();

        let pipeline = pipeline(index.path());
        let outcome = pipeline.process_files(&[pdf]).await.unwrap();
        assert_eq!(outcome.to_string(), "Files processed successfully");
        assert_eq!(outcome.extraction().pages_native, 1);
        assert_eq!(outcome.extraction().pages_ocr, 0);

        for backend in ["gemini", "groq"] {
            let answer = pipeline
                .ask_question("What is the capital of France?", backend)
                .await
                .unwrap();
            assert!(answer.contains("Paris"), "{} answer: {}", backend, answer);
        }

        let run = pipeline.ledger().latest_run().unwrap().unwrap();
        assert_eq!(run.chunk_count, 1);
        assert_eq!(run.files.len(), 1);
    }

    #[tokio::test]
    async fn test_paris_end_to_end_from_image() {
        let docs = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let scan = write(docs.path(), "scan.png", "The capital of France is Paris.");

        let pipeline = pipeline(index.path());
        let outcome = pipeline.process_files(&[scan]).await.unwrap();
        assert_eq!(outcome.to_string(), "Files processed successfully");
        assert!(outcome.is_indexed());

        for backend in ["gemini", "groq"] {
            let answer = pipeline
                .ask_question("What is the capital of France?", backend)
                .await
                .unwrap();
            assert!(answer.contains("Paris"), "{} answer: {}", backend, answer);
        }

        let run = pipeline.ledger().latest_run().unwrap().unwrap();
        assert_eq!(run.chunk_count, 1);
        assert_eq!(run.backends, vec![Backend::Gemini, Backend::Groq]);
    }

    #[tokio::test]
    async fn test_blank_files_report_no_text() {
        let docs = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let blank = write(docs.path(), "blank.png", "   ");
        let broken = write(docs.path(), "broken.pdf", "not a pdf");

        let pipeline = pipeline(index.path());
        let outcome = pipeline.process_files(&[blank, broken]).await.unwrap();

        assert_eq!(outcome.to_string(), "No text could be extracted from the files.");
        assert_eq!(outcome.extraction().files_failed, 1);
        assert!(!pipeline.indexer().exists(Backend::Gemini));
        assert!(pipeline.ledger().latest_run().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ask_before_processing() {
        let index = TempDir::new().unwrap();
        let pipeline = pipeline(index.path());

        let err = pipeline.ask_question("anything?", "groq").await.unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(PipelineError::IndexNotFound {
                backend: Backend::Groq,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_unknown_backend_is_invalid_argument() {
        let index = TempDir::new().unwrap();
        let pipeline = pipeline(index.path());

        let err = pipeline.ask_question("anything?", "bogus").await.unwrap_err();
        assert!(matches!(classify(&err), Some(PipelineError::InvalidArgument(_))));
        assert!(err.to_string().contains("gemini"));
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let docs = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let scan = write(docs.path(), "scan.png", "Some indexed words here.");

        let pipeline = pipeline(index.path());
        pipeline.process_files(&[scan]).await.unwrap();

        assert_eq!(pipeline.clear().await.unwrap(), 2);
        assert!(pipeline.ledger().latest_run().unwrap().is_none());
        let err = pipeline.ask_question("words?", "gemini").await.unwrap_err();
        assert!(matches!(classify(&err), Some(PipelineError::IndexNotFound { .. })));
    }
}
