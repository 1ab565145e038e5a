//! Groq chat completions 클라이언트 (OpenAI 호환)
//! source: https://console.groq.com/docs/api-reference#chat

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatModel, ChatRequest};
use crate::config::GroqSettings;
use crate::error::PipelineError;

/// Groq 채팅 모델
pub struct GroqChat {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GroqChat {
    pub fn new(api_key: Option<String>, model: &str, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_settings(settings: &GroqSettings) -> Result<Self> {
        Self::new(settings.api_key.clone(), &settings.chat_model, &settings.base_url)
    }
}

/// 문서는 단일 user 메시지 안에 합칩니다 (프롬프트 앞, 줄바꿈 구분)
fn build_body<'a>(model: &'a str, request: &ChatRequest) -> CompletionRequest<'a> {
    let content = if request.documents.is_empty() {
        request.prompt.clone()
    } else {
        format!("{}\n{}", request.documents.join("\n"), request.prompt)
    };

    CompletionRequest {
        model,
        messages: vec![Message {
            role: "user",
            content,
        }],
        temperature: request.temperature,
    }
}

#[async_trait]
impl ChatModel for GroqChat {
    async fn generate(&self, request: &ChatRequest) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            PipelineError::Config("Groq API key not found. Set GROQ_API_KEY.".to_string())
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&build_body(&self.model, request))
            .send()
            .await
            .context("Failed to send Groq chat request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(PipelineError::service("groq", status, message).into());
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&body).context("Failed to parse Groq response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                PipelineError::service("groq", status, "response contained no message").into()
            })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
