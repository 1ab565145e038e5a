//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 백엔드별 임베딩 프로바이더입니다.
//! - `gemini` 백엔드: Gemini 임베딩 API ([`GeminiEmbedding`])
//! - `groq` 백엔드: 로컬 문장 임베딩 모델 ([`LocalEmbedding`])
//!
//! 같은 인덱스를 만들고 질의할 때는 반드시 같은 프로바이더를 사용해야 합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = GeminiEmbedding::new(Some(api_key), "gemini-embedding-001", 768)?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

mod local;

pub use local::LocalEmbedding;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::GeminiSettings;
use crate::error::PipelineError;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 문서 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 질의 텍스트 임베딩 (기본 구현: 문서와 동일)
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// Gemini 임베딩 API 베이스 URL
/// source: https://ai.google.dev/gemini-api/docs/embeddings
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// Rate Limiter 설정 (Gemini 무료 티어: 60 RPM)
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이 (1000ms = 60 RPM 준수)
const MIN_DELAY_MS: u64 = 1000;

/// Gemini 임베딩 태스크 타입
#[derive(Debug, Clone, Copy)]
enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

impl TaskType {
    fn as_str(&self) -> &'static str {
        match self {
            TaskType::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            TaskType::RetrievalQuery => "RETRIEVAL_QUERY",
        }
    }
}

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
    dimension: usize,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    /// 요청 가능 여부 확인 및 대기
    async fn acquire(&mut self) {
        // 1. 최소 딜레이 적용 (버스트 방지)
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::debug!("Min delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        let now = Instant::now();

        // 2. 윈도우 밖의 오래된 요청 제거
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        // 3. Rate limit 초과 시 대기
        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        // 4. 현재 요청 기록
        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl GeminiEmbedding {
    /// 새 Gemini 임베딩 인스턴스 생성
    ///
    /// 키가 없어도 생성은 되며, 첫 호출에서 `PipelineError::Config`로 실패합니다.
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    /// * `model` - 임베딩 모델 (예: `gemini-embedding-001`)
    /// * `dimension` - 임베딩 차원 (768, 1536, 3072 중 선택)
    pub fn new(api_key: Option<String>, model: &str, dimension: usize) -> Result<Self> {
        if ![768, 1536, 3072].contains(&dimension) {
            return Err(PipelineError::Config(format!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            ))
            .into());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
            RATE_LIMIT_RPM,
            RATE_LIMIT_WINDOW,
        )));

        Ok(Self {
            api_key,
            model: model.trim_start_matches("models/").to_string(),
            client,
            dimension,
            rate_limiter,
        })
    }

    /// 설정에서 생성
    pub fn from_settings(settings: &GeminiSettings) -> Result<Self> {
        Self::new(
            settings.api_key.clone(),
            &settings.embedding_model,
            settings.embedding_dimension,
        )
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            PipelineError::Config(
                "Gemini API key not found. Set GEMINI_API_KEY or GOOGLE_API_KEY.".to_string(),
            )
            .into()
        })
    }

    async fn embed_with_task(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>> {
        let api_key = self.api_key()?;

        // 빈 텍스트 거부
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidArgument(
                "cannot embed blank text".to_string(),
            )
            .into());
        }

        let request = EmbedRequest {
            model: format!("models/{}", self.model),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: task_type.as_str().to_string(),
            output_dimensionality: Some(self.dimension),
        };

        {
            let mut limiter = self.rate_limiter.lock().await;
            limiter.acquire().await;
        }

        // API 키는 URL이 아닌 헤더로 전송
        let url = format!("{}/{}:embedContent", GEMINI_API_BASE, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send embedding request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            return Err(gemini_error("gemini-embedding", status, &body).into());
        }

        let embed_response: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;
        Ok(embed_response.embedding.values)
    }
}

/// Gemini API 요청 본문
/// source: https://ai.google.dev/gemini-api/docs/embeddings
#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

/// Gemini 에러 본문을 `PipelineError::Service`로 변환
///
/// 임베딩/채팅/비전 호출이 같은 에러 형식을 공유합니다.
pub(crate) fn gemini_error(
    service: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> PipelineError {
    match serde_json::from_str::<GeminiError>(body) {
        Ok(error) if !error.error.status.is_empty() => {
            PipelineError::service(service, error.error.status, error.error.message)
        }
        Ok(error) => PipelineError::service(service, status, error.error.message),
        Err(_) => PipelineError::service(service, status, body.to_string()),
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(text, TaskType::RetrievalDocument).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(text, TaskType::RetrievalQuery).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Gemini embedContent는 단건 API이므로 순차 처리 (Rate limiter가 조절)
        let mut results = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding chunk {}/{}", i + 1, texts.len());
            results.push(self.embed(text).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
