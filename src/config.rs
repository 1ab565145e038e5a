//! 파이프라인 설정
//!
//! 환경변수(및 `.env`)에서 읽습니다. API 키는 로드 시점에는 선택 사항이며,
//! 실제로 키를 사용하는 컴포넌트가 호출될 때 `PipelineError::Config`로 실패합니다.

use std::path::PathBuf;
use std::str::FromStr;

use crate::embedding::DEFAULT_DIMENSION;
use crate::error::PipelineError;
use crate::knowledge::ChunkConfig;

/// 기본 검색 청크 수
pub const DEFAULT_TOP_K: usize = 4;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.docchat-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docchat-rag")
}

// ============================================================================
// Settings
// ============================================================================

/// Gemini 설정 (임베딩 + 채팅 + 비전 OCR)
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub chat_model: String,
    pub temperature: f32,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            embedding_model: "gemini-embedding-001".to_string(),
            embedding_dimension: DEFAULT_DIMENSION,
            chat_model: "gemini-1.5-flash".to_string(),
            temperature: 0.3,
        }
    }
}

/// Groq 설정
#[derive(Debug, Clone)]
pub struct GroqSettings {
    pub api_key: Option<String>,
    pub chat_model: String,
    pub base_url: String,
}

impl Default for GroqSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            chat_model: "llama3-8b-8192".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
        }
    }
}

/// OCR 엔진 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrEngineKind {
    /// 로컬 tesseract 바이너리
    Tesseract,
    /// Gemini Vision API
    Gemini,
}

impl FromStr for OcrEngineKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tesseract" => Ok(Self::Tesseract),
            "gemini" => Ok(Self::Gemini),
            other => Err(PipelineError::Config(format!(
                "DOCCHAT_OCR_ENGINE must be 'tesseract' or 'gemini', got '{}'",
                other
            ))),
        }
    }
}

/// OCR / 래스터화 설정
#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub engine: OcrEngineKind,
    pub tesseract_cmd: String,
    pub tesseract_lang: Option<String>,
    pub pdftoppm_cmd: String,
    /// 72 DPI = PDF 포인트당 1픽셀 (문서 원본 해상도)
    pub render_dpi: u32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::Tesseract,
            tesseract_cmd: "tesseract".to_string(),
            tesseract_lang: None,
            pdftoppm_cmd: "pdftoppm".to_string(),
            render_dpi: 72,
        }
    }
}

// ============================================================================
// PipelineConfig
// ============================================================================

/// 전체 파이프라인 설정
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 백엔드별 인덱스 디렉토리의 루트
    pub index_root: PathBuf,
    pub chunk: ChunkConfig,
    pub top_k: usize,
    pub gemini: GeminiSettings,
    pub groq: GroqSettings,
    /// fastembed 모델 이름
    pub local_embedding_model: String,
    pub ocr: OcrSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            index_root: get_data_dir(),
            chunk: ChunkConfig::default(),
            top_k: DEFAULT_TOP_K,
            gemini: GeminiSettings::default(),
            groq: GroqSettings::default(),
            local_embedding_model: "all-minilm-l6-v2".to_string(),
            ocr: OcrSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 설정 로드 (빈 값은 미설정으로 취급)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let gemini_key = ["GEMINI_API_KEY", "GOOGLE_API_KEY", "GOOGLE_AI_API_KEY"]
            .iter()
            .find_map(|key| get(key));

        let config = Self {
            index_root: get("DOCCHAT_INDEX_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_root),
            chunk: ChunkConfig {
                max_characters: parse_or(
                    get("DOCCHAT_CHUNK_SIZE"),
                    "DOCCHAT_CHUNK_SIZE",
                    defaults.chunk.max_characters,
                )?,
                overlap_characters: parse_or(
                    get("DOCCHAT_CHUNK_OVERLAP"),
                    "DOCCHAT_CHUNK_OVERLAP",
                    defaults.chunk.overlap_characters,
                )?,
            },
            top_k: parse_or(get("DOCCHAT_TOP_K"), "DOCCHAT_TOP_K", defaults.top_k)?,
            gemini: GeminiSettings {
                api_key: gemini_key,
                embedding_model: get("GEMINI_EMBEDDING_MODEL")
                    .unwrap_or(defaults.gemini.embedding_model),
                embedding_dimension: parse_or(
                    get("GEMINI_EMBEDDING_DIMENSION"),
                    "GEMINI_EMBEDDING_DIMENSION",
                    defaults.gemini.embedding_dimension,
                )?,
                chat_model: get("GEMINI_CHAT_MODEL").unwrap_or(defaults.gemini.chat_model),
                temperature: parse_or(
                    get("GEMINI_TEMPERATURE"),
                    "GEMINI_TEMPERATURE",
                    defaults.gemini.temperature,
                )?,
            },
            groq: GroqSettings {
                api_key: get("GROQ_API_KEY"),
                chat_model: get("GROQ_CHAT_MODEL").unwrap_or(defaults.groq.chat_model),
                base_url: defaults.groq.base_url,
            },
            local_embedding_model: get("LOCAL_EMBEDDING_MODEL")
                .unwrap_or(defaults.local_embedding_model),
            ocr: OcrSettings {
                engine: match get("DOCCHAT_OCR_ENGINE") {
                    Some(value) => value.parse()?,
                    None => defaults.ocr.engine,
                },
                tesseract_cmd: get("TESSERACT_CMD").unwrap_or(defaults.ocr.tesseract_cmd),
                tesseract_lang: get("TESSERACT_LANG"),
                pdftoppm_cmd: get("PDFTOPPM_CMD").unwrap_or(defaults.ocr.pdftoppm_cmd),
                render_dpi: defaults.ocr.render_dpi,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// 값 범위 검증
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.chunk.validate()?;
        if self.top_k == 0 {
            return Err(PipelineError::Config("DOCCHAT_TOP_K must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Gemini API 키 (없으면 설정 에러)
    pub fn require_gemini_key(&self) -> Result<&str, PipelineError> {
        self.gemini.api_key.as_deref().ok_or_else(|| {
            PipelineError::Config(
                "Gemini API key not found. Set GEMINI_API_KEY or GOOGLE_API_KEY.\n\
                 Get your API key at: https://aistudio.google.com/app/apikey"
                    .to_string(),
            )
        })
    }

    /// Groq API 키 (없으면 설정 에러)
    pub fn require_groq_key(&self) -> Result<&str, PipelineError> {
        self.groq.api_key.as_deref().ok_or_else(|| {
            PipelineError::Config(
                "GROQ_API_KEY not set. Get your API key at: https://console.groq.com/keys"
                    .to_string(),
            )
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, PipelineError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::Config(format!("Invalid value for {}: '{}'", key, raw))),
        None => Ok(default),
    }
}
