//! 트랜슬레이터 에러 타입
//!
//! [`TranslatorError`]는 규칙 문서 컴파일과 적용 과정의 모든 에러를
//! 표현합니다. `From<TranslatorError> for NormwireError` 변환이 구현되어
//! 있어 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use normwire_core::error::{NormwireError, RuleError};

/// 규칙 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum TranslatorError {
    /// 규칙 문서 로딩 실패 (I/O 또는 JSON 문법)
    #[error("rule load error: {path}: {reason}")]
    Load {
        /// 규칙 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 규칙 문서가 기대하는 형태가 아님
    #[error("invalid rule document: {0}")]
    InvalidDocument(String),

    /// 알 수 없는 재작성 연산자
    #[error("unknown rewrite operator '{op}' for '{path}'")]
    UnknownOperator {
        /// 규칙 엔트리의 키 (소스 또는 타깃 경로)
        path: String,
        /// 연산자 이름
        op: String,
    },

    /// 지원하지 않는 타입 강제 변환
    #[error("unsupported coercion type '{0}'")]
    UnknownCoercion(String),

    /// `when` 조건식 문법 에러
    #[error("bad predicate '{expr}': {reason}")]
    BadPredicate {
        /// 원본 조건식
        expr: String,
        /// 실패 사유
        reason: String,
    },

    /// 패턴 문법 에러
    #[error("bad pattern '{pattern}': {reason}")]
    BadPattern {
        /// 원본 패턴
        pattern: String,
        /// 실패 사유
        reason: String,
    },

    /// 패턴이 입력과 일치하지 않음
    #[error("pattern mismatch at offset {offset}")]
    PatternMismatch {
        /// 실패 위치 (바이트 오프셋)
        offset: usize,
    },

    /// 필드 캡처를 주석된 타입으로 변환할 수 없음
    #[error("bad capture for field '{field}': {reason}")]
    BadCapture {
        /// 필드 이름
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TranslatorError> for NormwireError {
    fn from(err: TranslatorError) -> Self {
        NormwireError::Rule(RuleError::Invalid(err.to_string()))
    }
}
