//! 모델 백엔드 선택
//!
//! 질의 시점에 선택되는 백엔드는 닫힌 열거형입니다.
//! 임베딩 공간이 백엔드마다 다르므로 인덱스도 백엔드별로 분리됩니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// 모델 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Gemini 임베딩 + Gemini 채팅
    Gemini,
    /// 로컬 임베딩 + Groq 채팅
    Groq,
}

impl Backend {
    /// 인제스트 시 빌드 순서
    pub const ALL: [Backend; 2] = [Backend::Gemini, Backend::Groq];

    /// 식별자 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gemini => "gemini",
            Backend::Groq => "groq",
        }
    }

    /// 인덱스 루트 아래의 디렉토리 이름
    pub fn index_dir_name(&self) -> &'static str {
        match self {
            Backend::Gemini => "gemini_index",
            Backend::Groq => "groq_index",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Backend::Gemini),
            "groq" => Ok(Backend::Groq),
            other => Err(PipelineError::InvalidArgument(format!(
                "unknown backend '{}', expected one of: gemini, groq",
                other
            ))),
        }
    }
}

// ============================================================================
// PerBackend
// ============================================================================

/// 백엔드별 값 묶음 (match로 빠짐없이 선택)
#[derive(Debug, Clone)]
pub struct PerBackend<T> {
    pub gemini: T,
    pub groq: T,
}

impl<T> PerBackend<T> {
    pub fn new(gemini: T, groq: T) -> Self {
        Self { gemini, groq }
    }

    /// 백엔드에 해당하는 값
    pub fn get(&self, backend: Backend) -> &T {
        match backend {
            Backend::Gemini => &self.gemini,
            Backend::Groq => &self.groq,
        }
    }
}
