//! 이벤트 파서 경계 -- `text -> tree` 함수 인터페이스
//!
//! 원시 이벤트 텍스트를 키-값 트리로 토크나이즈하는 모든 것이
//! [`Parser`]입니다. 클로저도 그대로 파서로 사용할 수 있습니다.

use crate::error::NormwireError;
use crate::event::DataMap;

/// 원시 이벤트 텍스트를 키-값 트리로 변환하는 파서
///
/// 파싱은 CPU 바운드 연산이며 블로킹하지 않습니다. 실패할 수 있으므로
/// `Result`를 반환하고, 실패한 이벤트는 호출자가 드롭합니다.
pub trait Parser: Send + Sync {
    /// 원시 텍스트를 파싱합니다.
    fn parse(&self, text: &str) -> Result<DataMap, NormwireError>;
}

impl<F> Parser for F
where
    F: Fn(&str) -> Result<DataMap, NormwireError> + Send + Sync,
{
    fn parse(&self, text: &str) -> Result<DataMap, NormwireError> {
        self(text)
    }
}
