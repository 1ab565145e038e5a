//! 로컬 문장 임베딩 (fastembed, ONNX)
//!
//! `groq` 백엔드의 인덱스용 임베딩입니다. API 키가 필요 없고,
//! 첫 사용 시 모델을 내려받아 캐시합니다.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::OnceCell;

use super::EmbeddingProvider;
use crate::error::PipelineError;

/// 지원 모델 (이름, fastembed 모델, 차원)
fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize), PipelineError> {
    match name.trim().to_lowercase().as_str() {
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            Ok((EmbeddingModel::AllMiniLML6V2, 384))
        }
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        other => Err(PipelineError::Config(format!(
            "Unsupported LOCAL_EMBEDDING_MODEL '{}'. Use all-minilm-l6-v2 or bge-small-en-v1.5",
            other
        ))),
    }
}

/// fastembed 기반 로컬 임베딩
///
/// 모델 로딩은 무겁기 때문에 첫 임베딩 호출까지 미룹니다.
pub struct LocalEmbedding {
    name: String,
    model_kind: EmbeddingModel,
    dimension: usize,
    model: OnceCell<Arc<Mutex<TextEmbedding>>>,
}

impl LocalEmbedding {
    /// 모델 이름으로 생성 (모델은 아직 로드하지 않음)
    pub fn new(model_name: &str) -> Result<Self> {
        let (model_kind, dimension) = resolve_model(model_name)?;
        Ok(Self {
            name: model_name.to_string(),
            model_kind,
            dimension,
            model: OnceCell::new(),
        })
    }

    async fn model(&self) -> Result<Arc<Mutex<TextEmbedding>>> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let kind = self.model_kind.clone();
                tracing::info!("Loading local embedding model: {}", self.name);
                let model = tokio::task::spawn_blocking(move || {
                    TextEmbedding::try_new(InitOptions::new(kind))
                })
                .await
                .context("Embedding model load task failed")?
                .map_err(|e| anyhow::anyhow!("Failed to load embedding model: {}", e))?;
                Ok::<_, anyhow::Error>(Arc::new(Mutex::new(model)))
            })
            .await?;
        Ok(Arc::clone(model))
    }

    /// 블로킹 스레드에서 배치 임베딩
    async fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = self.model().await?;
        let count = texts.len();

        let embeddings = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
            model
                .embed(texts, None)
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await
        .context("Embedding task failed")??;

        if embeddings.len() != count {
            anyhow::bail!(
                "Local embedding returned {} vectors for {} texts",
                embeddings.len(),
                count
            );
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_blocking(vec![text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Local embedding returned no vector"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        tracing::debug!("Embedding {} chunks locally", texts.len());
        self.embed_blocking(texts.to_vec()).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}
