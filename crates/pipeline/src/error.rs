//! 파이프라인 에러 타입
//!
//! [`NormPipelineError`]는 파이프라인 구성과 실행의 에러를 표현합니다.
//! `From<NormPipelineError> for NormwireError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use normwire_core::error::{NormwireError, PipelineError};
use normwire_translator::TranslatorError;

/// 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum NormPipelineError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 규칙 로딩/컴파일 에러
    #[error("rule error: {0}")]
    Rule(#[from] TranslatorError),

    /// 스키마 로딩 에러
    #[error("schema error: {0}")]
    Schema(#[from] normwire_core::error::SchemaError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<NormPipelineError> for NormwireError {
    fn from(err: NormPipelineError) -> Self {
        NormwireError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}
