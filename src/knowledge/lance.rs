//! LanceDB Vector Store - 백엔드별 영속 벡터 인덱스
//!
//! 인덱스 디렉토리 하나에 `chunks` 테이블 하나를 둡니다.
//! 임베딩 차원은 백엔드마다 다르므로 스키마 차원은 입력 엔트리에서 정합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::{Connection, CreateTableMode};
use lancedb::query::{ExecutableQuery, QueryBase};

use super::vector::{common_dimension, SearchResult, VectorEntry, VectorStore};
use crate::backend::Backend;
use crate::error::PipelineError;

/// 벡터 테이블 이름
const TABLE_NAME: &str = "chunks";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
    path: PathBuf,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기 (없으면 생성)
    ///
    /// # Arguments
    /// * `path` - 인덱스 디렉토리 경로
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create index root directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// 이미 빌드된 인덱스만 열기
    ///
    /// 디렉토리나 테이블이 없으면 `PipelineError::IndexNotFound`.
    pub async fn open_existing(path: &Path, backend: Backend) -> Result<Self> {
        let not_found = || PipelineError::IndexNotFound {
            backend,
            path: path.to_path_buf(),
        };

        if !path.is_dir() {
            return Err(not_found().into());
        }

        let store = Self::open(path).await?;
        if !store.table_exists().await {
            return Err(not_found().into());
        }

        Ok(store)
    }

    /// 인덱스 디렉토리 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 벡터 테이블 스키마 생성
    fn create_schema(dimension: i32) -> Schema {
        Schema::new(vec![
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(entries: &[VectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        let dimension =
            i32::try_from(common_dimension(entries)?).context("Embedding dimension too large")?;

        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.chunk_index).collect();
        let chunk_texts: Vec<&str> = entries.iter().map(|e| e.chunk_text.as_str()).collect();

        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema(dimension)),
            vec![
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.iter().any(|name| name == TABLE_NAME))
            .unwrap_or(false)
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open chunks table")
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn replace_all(&self, entries: &[VectorEntry]) -> Result<usize> {
        let batch = Self::entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        self.db
            .create_table(TABLE_NAME, batches)
            .mode(CreateTableMode::Overwrite)
            .execute()
            .await
            .context("Failed to write chunks table")?;

        tracing::debug!("Wrote {} vectors to {:?}", entries.len(), self.path);
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if !self.table_exists().await {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;

        let results = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = results.try_collect().await?;
        let mut search_results = Vec::new();

        for batch in batches {
            let chunk_indices = batch
                .column_by_name("chunk_index")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_index column"))?;

            let chunk_texts = batch
                .column_by_name("chunk_text")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_text column"))?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                let distance = distances.value(i);
                search_results.push(SearchResult {
                    chunk_index: chunk_indices.value(i),
                    chunk_text: chunk_texts.value(i).to_string(),
                    similarity: 1.0 / (1.0 + distance),
                });
            }
        }

        // 배치가 여러 개로 나뉘어 와도 가까운 순서 유지
        search_results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        search_results.truncate(limit);

        Ok(search_results)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================
