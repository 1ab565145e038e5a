//! 채팅 모델 클라이언트
//!
//! - [`GeminiChat`]: Gemini `generateContent`
//! - [`GroqChat`]: Groq OpenAI 호환 `chat/completions`

mod gemini;
mod groq;

pub use gemini::GeminiChat;
pub use groq::GroqChat;

use anyhow::Result;
use async_trait::async_trait;

/// 채팅 모델 요청
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// 최종 프롬프트 (질문 포함)
    pub prompt: String,
    /// 프롬프트 앞에 별도 파트로 전달할 문서들 (없으면 프롬프트에 인라인)
    pub documents: Vec<String>,
    /// 샘플링 온도 (None이면 서비스 기본값)
    pub temperature: Option<f32>,
}

/// 채팅 모델 트레이트
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 답변 생성 (모델 출력 그대로 반환)
    async fn generate(&self, request: &ChatRequest) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}
