//! 파이프라인 에러 분류
//!
//! 내부 컴포넌트는 `anyhow::Result`를 반환하고, 호출자가 구분해야 하는
//! 실패만 `PipelineError`로 감싸서 올립니다.
//! 호출자는 `err.downcast_ref::<PipelineError>()`로 종류를 확인합니다.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::Backend;

/// 호출자에게 전달되는 분류된 에러
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 필수 설정/자격 증명 누락 또는 잘못된 값 (재시도 없음)
    #[error("Configuration error: {0}")]
    Config(String),

    /// 해당 백엔드 인덱스가 아직 생성되지 않음
    #[error("No index for backend '{backend}' at {path}. Process documents first.")]
    IndexNotFound { backend: Backend, path: PathBuf },

    /// 잘못된 인자 (알 수 없는 백엔드, 빈 질문 등)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 외부 서비스(임베딩/LLM/OCR) 호출 실패
    #[error("{service} error ({status}): {message}")]
    Service {
        service: String,
        status: String,
        message: String,
    },
}

impl PipelineError {
    /// 외부 서비스 에러 생성 헬퍼
    pub fn service(
        service: impl Into<String>,
        status: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::Service {
            service: service.into(),
            status: status.to_string(),
            message: message.into(),
        }
    }
}

/// anyhow 에러 체인에서 `PipelineError` 찾기
pub fn classify(err: &anyhow::Error) -> Option<&PipelineError> {
    err.chain().find_map(|cause| cause.downcast_ref::<PipelineError>())
}
