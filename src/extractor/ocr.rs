//! OCR 엔진
//!
//! 래스터 이미지에서 텍스트를 인식합니다.
//! - [`TesseractOcr`]: 로컬 `tesseract` 바이너리 (stdin → stdout)
//! - [`GeminiVisionOcr`]: Gemini Vision API

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::embedding::gemini_error;
use crate::error::PipelineError;

// ============================================================================
// Raster Image
// ============================================================================

/// 인코딩된 래스터 이미지 (PNG, JPEG 등)
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub data: Vec<u8>,
    pub mime_type: &'static str,
}

impl RasterImage {
    pub fn new(data: Vec<u8>, mime_type: &'static str) -> Self {
        Self { data, mime_type }
    }

    /// 이미지 파일 읽기
    ///
    /// 확장자로 형식을 정하지 못하면 내용의 시그니처로 판별합니다.
    /// 둘 다 실패하면 `application/octet-stream`으로 남기고 판단은 OCR 엔진에 맡깁니다.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image: {:?}", path))?;
        let mime_type = get_mime_type(path)
            .or_else(|| sniff_mime_type(&data))
            .unwrap_or(OCTET_STREAM);
        Ok(Self { data, mime_type })
    }

    /// 알려진 이미지 형식인지 여부
    pub fn is_known_format(&self) -> bool {
        self.mime_type != OCTET_STREAM
    }
}

/// 형식을 알 수 없는 이미지의 MIME 타입
pub const OCTET_STREAM: &str = "application/octet-stream";

/// 파일 확장자에서 MIME 타입 결정
pub fn get_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())?;

    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// 파일 시그니처(매직 바이트)로 MIME 타입 결정
pub fn sniff_mime_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        Some("image/tiff")
    } else if data.starts_with(b"BM") {
        Some("image/bmp")
    } else {
        None
    }
}

// ============================================================================
// OcrEngine Trait
// ============================================================================

/// OCR 엔진 트레이트
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// 이미지에서 텍스트 인식
    async fn recognize(&self, image: &RasterImage) -> Result<String>;

    /// 엔진 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Tesseract
// ============================================================================

/// tesseract CLI 기반 OCR
pub struct TesseractOcr {
    command: String,
    language: Option<String>,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, language: Option<String>) -> Self {
        Self {
            command: command.into(),
            language,
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &RasterImage) -> Result<String> {
        let mut command = tokio::process::Command::new(&self.command);
        command.arg("stdin").arg("stdout");
        if let Some(ref lang) = self.language {
            command.arg("-l").arg(lang);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to run '{}'. Is tesseract installed?", self.command))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("tesseract stdin unavailable"))?;
        stdin
            .write_all(&image.data)
            .await
            .context("Failed to send image to tesseract")?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for tesseract")?;

        if !output.status.success() {
            return Err(PipelineError::service(
                "tesseract",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

// ============================================================================
// Gemini Vision
// ============================================================================

/// Gemini generateContent 엔드포인트 베이스
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// 이미지 텍스트 추출 프롬프트
const EXTRACTION_PROMPT: &str = r#"Extract all text content from this image.

Instructions:
1. Transcribe every piece of visible text
2. Include text from documents, diagrams, code and tables
3. Preserve the original reading order and line breaks
4. Output only the transcribed text, without commentary
5. If there is no text, output nothing"#;

/// Gemini Vision 기반 OCR
pub struct GeminiVisionOcr {
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl GeminiVisionOcr {
    pub fn new(api_key: Option<String>, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.to_string(),
            client,
        })
    }
}

#[async_trait]
impl OcrEngine for GeminiVisionOcr {
    async fn recognize(&self, image: &RasterImage) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            PipelineError::Config("Gemini API key required for Gemini Vision OCR".to_string())
        })?;

        if !image.is_known_format() {
            return Err(PipelineError::InvalidArgument(
                "Gemini Vision OCR needs a PNG, JPEG, WEBP, GIF, BMP or TIFF image".to_string(),
            )
            .into());
        }

        let request = VisionRequest {
            contents: vec![VisionContent {
                parts: vec![
                    VisionPart::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                    VisionPart::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type.to_string(),
                            data: STANDARD.encode(&image.data),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 8192,
            },
        };

        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send Vision API request")?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(gemini_error("gemini-vision", status, &body).into());
        }

        let vision_response: VisionResponse =
            serde_json::from_str(&body).context("Failed to parse Vision API response")?;

        Ok(vision_text(vision_response))
    }

    fn name(&self) -> &str {
        "gemini-vision"
    }
}

/// 첫 후보의 텍스트 (차단되었거나 내용이 없으면 빈 문자열)
fn vision_text(response: VisionResponse) -> String {
    let Some(candidate) = response.candidates.into_iter().next() else {
        tracing::warn!("Gemini Vision returned no candidates");
        return String::new();
    };

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        tracing::warn!(
            "Gemini Vision returned no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        );
    }

    text
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct VisionRequest {
    contents: Vec<VisionContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct VisionContent {
    parts: Vec<VisionPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum VisionPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct VisionResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

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
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    text: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
