//! Gemini generateContent 클라이언트
//! source: https://ai.google.dev/api/generate-content

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{ChatModel, ChatRequest};
use crate::config::GeminiSettings;
use crate::embedding::gemini_error;
use crate::error::PipelineError;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini 채팅 모델
pub struct GeminiChat {
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl GeminiChat {
    pub fn new(api_key: Option<String>, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.trim_start_matches("models/").to_string(),
            client,
        })
    }

    pub fn from_settings(settings: &GeminiSettings) -> Result<Self> {
        Self::new(settings.api_key.clone(), &settings.chat_model)
    }
}

/// 문서마다 한 파트, 마지막에 프롬프트 파트
fn build_body(request: &ChatRequest) -> GenerateRequest {
    let parts = request
        .documents
        .iter()
        .chain(std::iter::once(&request.prompt))
        .map(|text| Part { text: text.clone() })
        .collect();

    GenerateRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
        generation_config: request.temperature.map(|temperature| GenerationConfig {
            temperature,
        }),
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn generate(&self, request: &ChatRequest) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            PipelineError::Config(
                "Gemini API key not found. Set GEMINI_API_KEY or GOOGLE_API_KEY.".to_string(),
            )
        })?;

        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&build_body(request))
            .send()
            .await
            .context("Failed to send Gemini chat request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;

        if !status.is_success() {
            return Err(gemini_error("gemini-chat", status, &body).into());
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse Gemini chat response")?;

        Ok(candidate_text(parsed, status)?)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback", default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason", default)]
    block_reason: Option<String>,
}

/// 차단된 후보는 `content` 없이 `finishReason`만 옵니다
#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// 첫 후보의 텍스트 추출
///
/// 후보가 없거나 내용 없이 끝났으면 차단/종료 사유를 상태로 담은
/// `PipelineError::Service`를 돌려줍니다.
fn candidate_text(response: GenerateResponse, status: StatusCode) -> Result<String, PipelineError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response.prompt_feedback.and_then(|f| f.block_reason);
        return Err(match reason {
            Some(reason) => PipelineError::service("gemini-chat", reason, "prompt was blocked"),
            None => {
                PipelineError::service("gemini-chat", status, "response contained no candidates")
            }
        });
    };

    match candidate.content {
        Some(content) => Ok(content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("")),
        None => Err(PipelineError::service(
            "gemini-chat",
            candidate.finish_reason.unwrap_or_else(|| status.to_string()),
            "candidate finished without content",
        )),
    }
}
