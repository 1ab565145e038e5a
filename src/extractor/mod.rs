//! 텍스트 추출 모듈
//!
//! 업로드된 문서들에서 하나의 연속된 텍스트를 만듭니다.
//! - PDF: 페이지별 네이티브 텍스트, 비어 있으면 래스터화 후 OCR
//! - 이미지: 항상 OCR
//!
//! 파일 하나가 실패해도 전체 추출은 계속되며, 실패한 파일의
//! 부분 텍스트는 결과에 섞이지 않습니다.

pub mod ocr;
pub mod pdf;
pub mod raster;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::collector::{DocumentKind, SourceDocument};

pub use ocr::{GeminiVisionOcr, OcrEngine, RasterImage, TesseractOcr};
pub use pdf::{read_pdf_pages, PdfPage};
pub use raster::{PageRasterizer, PdftoppmRasterizer};

// ============================================================================
// Page Strategy
// ============================================================================

/// 한 페이지에서 최종적으로 얻은 텍스트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageText {
    /// PDF 내장 텍스트
    Native(String),
    /// 래스터화 후 OCR로 얻은 텍스트
    Ocr(String),
    /// 두 방법 모두 공백뿐
    Empty,
}

impl PageText {
    /// 최종 텍스트로 변환 (Empty → 빈 문자열)
    pub fn into_text(self) -> String {
        match self {
            PageText::Native(text) | PageText::Ocr(text) => text,
            PageText::Empty => String::new(),
        }
    }
}

// ============================================================================
// Extracted Text
// ============================================================================

/// 추출 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub files_ok: usize,
    pub files_failed: usize,
    pub pages_native: usize,
    pub pages_ocr: usize,
    pub pages_empty: usize,
}

impl ExtractionStats {
    fn record(&mut self, page: &PageText) {
        match page {
            PageText::Native(_) => self.pages_native += 1,
            PageText::Ocr(_) => self.pages_ocr += 1,
            PageText::Empty => self.pages_empty += 1,
        }
    }

    fn merge(&mut self, other: &ExtractionStats) {
        self.pages_native += other.pages_native;
        self.pages_ocr += other.pages_ocr;
        self.pages_empty += other.pages_empty;
    }
}

/// 추출 결과
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    /// 파일 순서, 페이지 순서대로 이어 붙인 텍스트 (구분자 없음)
    pub text: String,
    pub stats: ExtractionStats,
}

impl ExtractedText {
    /// 인덱싱할 내용이 없는지 (공백만 있어도 true)
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

// ============================================================================
// Text Extractor
// ============================================================================

/// 문서 텍스트 추출기
pub struct TextExtractor {
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl TextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self { ocr, rasterizer }
    }

    /// 경로 목록에서 추출 (종류는 확장자로 결정)
    pub async fn extract_paths(&self, paths: &[PathBuf]) -> ExtractedText {
        let documents: Vec<SourceDocument> =
            paths.iter().cloned().map(SourceDocument::new).collect();
        self.extract(&documents).await
    }

    /// 문서 목록에서 추출
    ///
    /// 실패한 파일은 경고 로그만 남기고 건너뜁니다.
    pub async fn extract(&self, documents: &[SourceDocument]) -> ExtractedText {
        let mut result = ExtractedText::default();

        for doc in documents {
            let extracted = match doc.kind {
                DocumentKind::Pdf => self.extract_pdf(&doc.path).await,
                DocumentKind::Image => self.extract_image(&doc.path).await.map(|text| {
                    (text, ExtractionStats::default())
                }),
            };

            match extracted {
                Ok((text, stats)) => {
                    tracing::debug!("Extracted {} chars from {:?}", text.len(), doc.path);
                    result.text.push_str(&text);
                    result.stats.merge(&stats);
                    result.stats.files_ok += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {:#}", doc.path, e);
                    result.stats.files_failed += 1;
                }
            }
        }

        tracing::info!(
            "Extraction done: {} ok, {} failed, {} chars",
            result.stats.files_ok,
            result.stats.files_failed,
            result.text.len()
        );

        result
    }

    /// 한 페이지의 텍스트 결정
    ///
    /// 네이티브 텍스트가 공백이 아니면 그대로 사용하고,
    /// 아니면 페이지를 렌더링해 OCR합니다.
    pub async fn resolve_page(&self, pdf: &Path, page: &PdfPage) -> Result<PageText> {
        if let Some(ref native) = page.native_text {
            if !native.trim().is_empty() {
                return Ok(PageText::Native(native.clone()));
            }
        }

        tracing::debug!("Page {} of {:?} has no text layer, running OCR", page.number, pdf);
        let image = self.rasterizer.rasterize(pdf, page.number).await?;
        let text = self
            .ocr
            .recognize(&image)
            .await
            .with_context(|| format!("OCR failed on page {} of {:?}", page.number, pdf))?;

        if text.trim().is_empty() {
            Ok(PageText::Empty)
        } else {
            Ok(PageText::Ocr(text))
        }
    }

    /// PDF 추출 (한 페이지라도 실패하면 파일 전체 실패)
    async fn extract_pdf(&self, path: &Path) -> Result<(String, ExtractionStats)> {
        // lopdf 파싱은 CPU 바운드
        let owned = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || read_pdf_pages(&owned))
            .await
            .context("PDF extraction task failed")??;

        let mut text = String::new();
        let mut stats = ExtractionStats::default();
        for page in &pages {
            let resolved = self.resolve_page(path, page).await?;
            stats.record(&resolved);
            text.push_str(&resolved.into_text());
        }

        Ok((text, stats))
    }

    async fn extract_image(&self, path: &Path) -> Result<String> {
        let image = RasterImage::from_file(path).await?;
        self.ocr
            .recognize(&image)
            .await
            .with_context(|| format!("OCR failed on {:?}", path))
    }
}

// ============================================================================
// Tests
// ============================================================================
