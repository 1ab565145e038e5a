//! 검색 + 답변 생성
//!
//! 질문을 인덱스와 같은 프로바이더로 임베딩하고, 가까운 청크 top-k를
//! 선택한 채팅 모델에 문맥으로 넘깁니다.

use std::sync::Arc;

use anyhow::{Context, Result};

use super::indexer::IndexLayout;
use super::lance::LanceVectorStore;
use super::vector::{SearchResult, VectorStore};
use crate::backend::{Backend, PerBackend};
use crate::embedding::EmbeddingProvider;
use crate::error::PipelineError;
use crate::llm::{ChatModel, ChatRequest};

/// 문맥 밖 추측을 막는 지시문
pub const GROUNDING_INSTRUCTION: &str = "Answer the question as detailed as possible from the provided context, make sure to provide all the details, if the answer is not in provided context just say, \"answer is not available in the context\", don't provide the wrong answer";

/// 출처가 붙은 답변
#[derive(Debug, Clone)]
pub struct GroundedAnswer {
    /// 모델 출력 (가공 없음)
    pub text: String,
    /// 문맥으로 사용한 청크 (가까운 순)
    pub sources: Vec<SearchResult>,
}

/// 백엔드별 프롬프트 구성
///
/// - `gemini`: 청크를 별도 파트로 보내고 프롬프트는 그 뒤에 붙입니다
/// - `groq`: 청크를 줄바꿈으로 이어 `Context:` 블록에 인라인합니다
pub fn build_request(
    backend: Backend,
    question: &str,
    chunks: &[SearchResult],
    temperature: f32,
) -> ChatRequest {
    let texts = chunks.iter().map(|c| c.chunk_text.clone());

    match backend {
        Backend::Gemini => ChatRequest {
            prompt: format!(
                "{}\n\nContext:\nThe documents provided above.\n\nQuestion:\n{}\n\nAnswer:\n",
                GROUNDING_INSTRUCTION, question
            ),
            documents: texts.collect(),
            temperature: Some(temperature),
        },
        Backend::Groq => ChatRequest {
            prompt: format!(
                "{}\n\nContext:\n{}\n\nQuestion:\n{}\n\nAnswer:\n",
                GROUNDING_INSTRUCTION,
                texts.collect::<Vec<_>>().join("\n"),
                question
            ),
            documents: Vec::new(),
            temperature: None,
        },
    }
}

/// 검색기 + 답변기
pub struct Answerer {
    layout: IndexLayout,
    embedders: PerBackend<Arc<dyn EmbeddingProvider>>,
    models: PerBackend<Arc<dyn ChatModel>>,
    top_k: usize,
    temperature: f32,
}

impl Answerer {
    pub fn new(
        layout: IndexLayout,
        embedders: PerBackend<Arc<dyn EmbeddingProvider>>,
        models: PerBackend<Arc<dyn ChatModel>>,
        top_k: usize,
        temperature: f32,
    ) -> Self {
        Self {
            layout,
            embedders,
            models,
            top_k,
            temperature,
        }
    }

    /// 백엔드 인덱스에서 질문과 가까운 청크 top-k 검색
    pub async fn retrieve(&self, question: &str, backend: Backend) -> Result<Vec<SearchResult>> {
        let path = self.layout.path_for(backend);
        let store = LanceVectorStore::open_existing(&path, backend).await?;

        let embedding = self
            .embedders
            .get(backend)
            .embed_query(question)
            .await
            .with_context(|| format!("Failed to embed question for {}", backend))?;

        let results = store.search(&embedding, self.top_k).await?;
        tracing::debug!("Retrieved {} chunks from {} index", results.len(), backend);
        Ok(results)
    }

    /// 질문에 답변
    pub async fn answer(&self, question: &str, backend: Backend) -> Result<String> {
        Ok(self.answer_with_sources(question, backend).await?.text)
    }

    pub async fn answer_with_sources(
        &self,
        question: &str,
        backend: Backend,
    ) -> Result<GroundedAnswer> {
        if question.trim().is_empty() {
            return Err(
                PipelineError::InvalidArgument("question must not be blank".to_string()).into(),
            );
        }

        let sources = self.retrieve(question, backend).await?;
        let request = build_request(backend, question, &sources, self.temperature);

        let model = self.models.get(backend);
        tracing::info!("Asking {} ({} context chunks)", model.name(), sources.len());
        let text = model
            .generate(&request)
            .await
            .with_context(|| format!("{} chat request failed", backend))?;

        Ok(GroundedAnswer { text, sources })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use crate::knowledge::indexer::Indexer;
    use crate::testing::{EchoChat, KeywordEmbedding};
    use tempfile::TempDir;

    fn result(text: &str) -> SearchResult {
        SearchResult {
            chunk_index: 0,
            chunk_text: text.to_string(),
            similarity: 1.0,
        }
    }

    fn embedders() -> PerBackend<Arc<dyn EmbeddingProvider>> {
        PerBackend::new(
            Arc::new(KeywordEmbedding::new(32)) as Arc<dyn EmbeddingProvider>,
            Arc::new(KeywordEmbedding::new(32)) as Arc<dyn EmbeddingProvider>,
        )
    }

    #[test]
    fn test_gemini_request_uses_parts() {
        let chunks = vec![result("alpha"), result("beta")];
        let request = build_request(Backend::Gemini, "what?", &chunks, 0.3);

        assert_eq!(request.documents, vec!["alpha", "beta"]);
        assert!(request.prompt.starts_with(GROUNDING_INSTRUCTION));
        assert!(request.prompt.contains("Question:\nwhat?"));
        assert!(!request.prompt.contains("alpha"));
        assert_eq!(request.temperature, Some(0.3));
    }

    #[test]
    fn test_groq_request_inlines_context() {
        let chunks = vec![result("alpha"), result("beta")];
        let request = build_request(Backend::Groq, "what?", &chunks, 0.3);

        assert!(request.documents.is_empty());
        assert!(request.prompt.contains("Context:\nalpha\nbeta\n"));
        assert!(request.prompt.contains("answer is not available in the context"));
        assert_eq!(request.temperature, None);
    }

    #[tokio::test]
    async fn test_answer_from_built_index() {
        let dir = TempDir::new().unwrap();
        let layout = IndexLayout::new(dir.path());
        let chunks = vec![
            "Bananas are yellow fruit.".to_string(),
            "The capital of France is Paris.".to_string(),
        ];
        Indexer::new(layout.clone(), embedders())
            .build_index(&chunks, Backend::Groq)
            .await
            .unwrap();

        let chat = Arc::new(EchoChat::default());
        let answerer = Answerer::new(
            layout,
            embedders(),
            PerBackend::new(
                Arc::new(EchoChat::default()) as Arc<dyn ChatModel>,
                chat.clone() as Arc<dyn ChatModel>,
            ),
            1,
            0.3,
        );

        let answer = answerer
            .answer_with_sources("What is the capital of France?", Backend::Groq)
            .await
            .unwrap();

        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].chunk_text, "The capital of France is Paris.");
        assert!(answer.text.contains("Paris"));
        assert_eq!(chat.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unbuilt_backend_is_index_not_found() {
        let dir = TempDir::new().unwrap();
        let answerer = Answerer::new(
            IndexLayout::new(dir.path()),
            embedders(),
            PerBackend::new(
                Arc::new(EchoChat::default()) as Arc<dyn ChatModel>,
                Arc::new(EchoChat::default()) as Arc<dyn ChatModel>,
            ),
            4,
            0.3,
        );

        let err = answerer.answer("anything?", Backend::Gemini).await.unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(PipelineError::IndexNotFound {
                backend: Backend::Gemini,
                ..
            })
        ));

        let err = answerer.answer("  ", Backend::Gemini).await.unwrap_err();
        assert!(matches!(classify(&err), Some(PipelineError::InvalidArgument(_))));
    }
}
