//! 인덱서 - 청크 임베딩 후 백엔드별 인덱스 교체
//!
//! 인덱스 위치: `<index_root>/<backend>_index`
//! 인제스트마다 이전 인덱스를 통째로 덮어씁니다 (마지막 작성자 우선).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use super::lance::LanceVectorStore;
use super::vector::{VectorEntry, VectorStore};
use crate::backend::{Backend, PerBackend};
use crate::embedding::EmbeddingProvider;
use crate::error::{classify, PipelineError};

// ============================================================================
// Index Layout
// ============================================================================

/// 인덱스 루트와 백엔드별 경로
#[derive(Debug, Clone)]
pub struct IndexLayout {
    root: PathBuf,
}

impl IndexLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 백엔드 인덱스 디렉토리
    pub fn path_for(&self, backend: Backend) -> PathBuf {
        self.root.join(backend.index_dir_name())
    }

    /// 인덱스 디렉토리 존재 여부
    pub fn exists(&self, backend: Backend) -> bool {
        self.path_for(backend).is_dir()
    }

    /// 인덱스에 저장된 청크 수 (인덱스가 없으면 None)
    ///
    /// 인덱스 루트에 아무것도 만들지 않습니다.
    pub async fn indexed_chunks(&self, backend: Backend) -> Result<Option<usize>> {
        let path = self.path_for(backend);
        match LanceVectorStore::open_existing(&path, backend).await {
            Ok(store) => Ok(Some(store.count().await?)),
            Err(e) if matches!(classify(&e), Some(PipelineError::IndexNotFound { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 모든 백엔드 인덱스 삭제, 삭제한 개수 반환
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for backend in Backend::ALL {
            let path = self.path_for(backend);
            if path.exists() {
                tokio::fs::remove_dir_all(&path)
                    .await
                    .with_context(|| format!("Failed to remove index: {:?}", path))?;
                tracing::info!("Removed {} index at {:?}", backend, path);
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// 인덱스 빌드 결과
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub backend: Backend,
    pub chunk_count: usize,
    pub dimension: usize,
    pub path: PathBuf,
}

// ============================================================================
// Indexer
// ============================================================================

/// 백엔드별 인덱스 작성기
pub struct Indexer {
    layout: IndexLayout,
    embedders: PerBackend<Arc<dyn EmbeddingProvider>>,
}

impl Indexer {
    pub fn new(layout: IndexLayout, embedders: PerBackend<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { layout, embedders }
    }

    pub fn layout(&self) -> &IndexLayout {
        &self.layout
    }

    /// 한 백엔드의 인덱스 빌드
    ///
    /// 청크를 순서대로 임베딩하고 기존 인덱스를 덮어씁니다.
    /// 공백뿐인 청크는 건너뛰며, 저장된 청크는 원래 위치를 `chunk_index`로 유지합니다.
    /// 자격 증명이 없으면 `PipelineError::Config`가 에러 체인에 남습니다.
    pub async fn build_index(&self, chunks: &[String], backend: Backend) -> Result<IndexSummary> {
        let kept: Vec<(usize, &String)> = chunks
            .iter()
            .enumerate()
            .filter(|(_, chunk)| !chunk.trim().is_empty())
            .collect();

        if kept.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "cannot build an index without non-blank chunks".to_string(),
            )
            .into());
        }
        if kept.len() < chunks.len() {
            tracing::debug!(
                "Skipping {} blank chunks for {}",
                chunks.len() - kept.len(),
                backend
            );
        }

        let embedder = self.embedders.get(backend);
        tracing::info!(
            "Embedding {} chunks for {} with {}",
            kept.len(),
            backend,
            embedder.name()
        );

        let texts: Vec<String> = kept.iter().map(|(_, chunk)| (*chunk).clone()).collect();
        let embeddings = embedder
            .embed_batch(&texts)
            .await
            .with_context(|| format!("Failed to embed chunks for {} index", backend))?;

        if embeddings.len() != texts.len() {
            anyhow::bail!(
                "{} returned {} embeddings for {} chunks",
                embedder.name(),
                embeddings.len(),
                texts.len()
            );
        }

        let entries: Vec<VectorEntry> = kept
            .into_iter()
            .zip(embeddings)
            .map(|((i, chunk), embedding)| VectorEntry {
                chunk_index: i as i32,
                chunk_text: chunk.clone(),
                embedding,
            })
            .collect();
        let dimension = entries.first().map(|e| e.embedding.len()).unwrap_or(0);

        let store = LanceVectorStore::open(&self.layout.path_for(backend))
            .await
            .with_context(|| format!("Failed to open {} index", backend))?;
        let chunk_count = store.replace_all(&entries).await?;
        let path = store.path().to_path_buf();

        tracing::info!(
            "Built {} index: {} chunks, dim={} at {:?}",
            backend,
            chunk_count,
            dimension,
            path
        );

        Ok(IndexSummary {
            backend,
            chunk_count,
            dimension,
            path,
        })
    }

    /// 모든 백엔드 인덱스 빌드 (gemini → groq 순서)
    pub async fn build_all(&self, chunks: &[String]) -> Result<Vec<IndexSummary>> {
        let mut summaries = Vec::with_capacity(Backend::ALL.len());
        for backend in Backend::ALL {
            summaries.push(self.build_index(chunks, backend).await?);
        }
        Ok(summaries)
    }

    /// 인덱스 디렉토리 존재 여부
    pub fn exists(&self, backend: Backend) -> bool {
        self.layout.exists(backend)
    }

    /// 인덱스에 저장된 청크 수 (인덱스가 없으면 None)
    pub async fn indexed_chunks(&self, backend: Backend) -> Result<Option<usize>> {
        self.layout.indexed_chunks(backend).await
    }

    /// 모든 백엔드 인덱스 삭제, 삭제한 개수 반환
    pub async fn clear(&self) -> Result<usize> {
        self.layout.clear().await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::KeywordEmbedding;
    use tempfile::TempDir;

    fn indexer(root: &Path) -> Indexer {
        Indexer::new(
            IndexLayout::new(root),
            PerBackend::new(
                Arc::new(KeywordEmbedding::new(16)) as Arc<dyn EmbeddingProvider>,
                Arc::new(KeywordEmbedding::new(8)) as Arc<dyn EmbeddingProvider>,
            ),
        )
    }

    fn chunks() -> Vec<String> {
        vec![
            "The capital of France is Paris.".to_string(),
            "Rust has no garbage collector.".to_string(),
        ]
    }

    #[test]
    fn test_layout_paths() {
        let layout = IndexLayout::new("/data");
        assert_eq!(layout.path_for(Backend::Gemini), PathBuf::from("/data/gemini_index"));
        assert_eq!(layout.path_for(Backend::Groq), PathBuf::from("/data/groq_index"));
    }

    #[tokio::test]
    async fn test_build_all_creates_both_indices() {
        let dir = TempDir::new().unwrap();
        let indexer = indexer(dir.path());

        let summaries = indexer.build_all(&chunks()).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].backend, Backend::Gemini);
        assert_eq!(summaries[0].dimension, 16);
        assert_eq!(summaries[1].dimension, 8);

        assert!(indexer.exists(Backend::Gemini));
        assert_eq!(indexer.indexed_chunks(Backend::Groq).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_rebuild_replaces_previous_index() {
        let dir = TempDir::new().unwrap();
        let indexer = indexer(dir.path());

        indexer.build_index(&chunks(), Backend::Gemini).await.unwrap();
        indexer
            .build_index(&["only one".to_string()], Backend::Gemini)
            .await
            .unwrap();

        assert_eq!(indexer.indexed_chunks(Backend::Gemini).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_empty_chunks_rejected() {
        let dir = TempDir::new().unwrap();
        let err = indexer(dir.path())
            .build_index(&[], Backend::Groq)
            .await
            .unwrap_err();
        assert!(matches!(classify(&err), Some(PipelineError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_blank_chunks_are_skipped() {
        let dir = TempDir::new().unwrap();
        let indexer = indexer(dir.path());
        let chunks = vec![
            "The capital of France is Paris.".to_string(),
            "   \n\t ".to_string(),
            "Rust has no garbage collector.".to_string(),
        ];

        let summary = indexer.build_index(&chunks, Backend::Groq).await.unwrap();
        assert_eq!(summary.chunk_count, 2);

        let store = LanceVectorStore::open_existing(&summary.path, Backend::Groq)
            .await
            .unwrap();
        let query = KeywordEmbedding::new(8).embed("garbage collector").await.unwrap();
        let mut indices: Vec<i32> = store
            .search(&query, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.chunk_index)
            .collect();
        indices.sort();
        assert_eq!(indices, vec![0, 2]);

        let err = indexer
            .build_index(&[" ".to_string(), "\n".to_string()], Backend::Groq)
            .await
            .unwrap_err();
        assert!(matches!(classify(&err), Some(PipelineError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_layout_queries_create_nothing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("index");
        let layout = IndexLayout::new(root.clone());

        assert!(!layout.exists(Backend::Gemini));
        assert_eq!(layout.indexed_chunks(Backend::Gemini).await.unwrap(), None);
        assert_eq!(layout.clear().await.unwrap(), 0);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_clear_removes_indices() {
        let dir = TempDir::new().unwrap();
        let indexer = indexer(dir.path());
        indexer.build_all(&chunks()).await.unwrap();

        assert_eq!(indexer.clear().await.unwrap(), 2);
        assert!(!indexer.exists(Backend::Gemini));
        assert_eq!(indexer.indexed_chunks(Backend::Gemini).await.unwrap(), None);
        assert_eq!(indexer.clear().await.unwrap(), 0);
    }
}
