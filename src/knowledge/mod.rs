//! Knowledge 모듈 - 청킹, 인덱싱, 검색
//!
//! - Chunker: 재귀 경계 탐색 분할
//! - LanceDB: 백엔드별 벡터 인덱스
//! - Indexer / Answerer: 인덱스 빌드와 검색 기반 답변
//! - Ledger: SQLite 인제스트 기록

mod chunker;
mod indexer;
mod lance;
mod ledger;
mod retriever;
mod vector;

// Re-exports
pub use chunker::{
    default_chunker, recursive_chunker, ChunkConfig, Chunker, RecursiveChunker,
    DEFAULT_SEPARATORS,
};
pub use indexer::{IndexLayout, IndexSummary, Indexer};
pub use lance::LanceVectorStore;
pub use ledger::{IngestLedger, IngestRun, NewIngestRun, LEDGER_FILE};
pub use retriever::{build_request, Answerer, GroundedAnswer, GROUNDING_INSTRUCTION};
pub use vector::{common_dimension, SearchResult, VectorEntry, VectorStore};
