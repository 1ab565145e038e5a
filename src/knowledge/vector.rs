//! Vector Store - 벡터 인덱스 트레이트 및 타입
//!
//! 인덱스는 백엔드별로 하나씩 존재하며, 인제스트마다 통째로 교체됩니다.

use anyhow::Result;
use async_trait::async_trait;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 청크 인덱스 (0-based, 청커 출력 순서)
    pub chunk_index: i32,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// 청크 인덱스
    pub chunk_index: i32,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 유사도 스코어 (0.0 ~ 1.0, 높을수록 가까움)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 기존 내용을 모두 버리고 엔트리로 교체
    async fn replace_all(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 최근접 이웃 검색 (가까운 순)
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;
}

/// 모든 엔트리가 같은 차원인지 확인하고 그 차원을 반환
pub fn common_dimension(entries: &[VectorEntry]) -> Result<usize> {
    let first = entries
        .first()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine dimension of empty entries"))?;
    let dimension = first.embedding.len();

    if dimension == 0 {
        anyhow::bail!("Embedding vectors must not be empty");
    }

    if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimension) {
        anyhow::bail!(
            "Embedding dimension mismatch: chunk {} has {} values, expected {}",
            bad.chunk_index,
            bad.embedding.len(),
            dimension
        );
    }

    Ok(dimension)
}

// ============================================================================
// Tests
// ============================================================================
