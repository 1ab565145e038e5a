//! docchat-rag - PDF/이미지 문서 질의응답 RAG
//!
//! 문서에서 텍스트를 추출(네이티브 텍스트 또는 OCR)해 청크로 나누고,
//! 백엔드별 LanceDB 인덱스에 임베딩한 뒤 검색된 문맥으로 답변합니다.
//!
//! - `gemini`: Gemini 임베딩 + Gemini 채팅
//! - `groq`: 로컬 fastembed 임베딩 + Groq 채팅

pub mod backend;
pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod llm;
pub mod pipeline;

#[cfg(test)]
mod testing;

// Re-exports
pub use backend::{Backend, PerBackend};
pub use config::{get_data_dir, PipelineConfig};
pub use embedding::{EmbeddingProvider, GeminiEmbedding, LocalEmbedding};
pub use error::{classify, PipelineError};
pub use extractor::{ExtractedText, PageText, TextExtractor};
pub use knowledge::{
    default_chunker, recursive_chunker, ChunkConfig, Chunker, IndexLayout, Indexer, IngestLedger,
    LanceVectorStore, SearchResult, VectorEntry, VectorStore,
};
pub use llm::{ChatModel, ChatRequest};
pub use pipeline::{DocumentPipeline, ProcessOutcome};
