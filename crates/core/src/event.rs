//! 이벤트 엔벨로프 — 파이프라인을 흐르는 기본 단위
//!
//! 모든 워커 간 통신은 [`Event`]를 큐에 실어 전달하는 방식으로 수행됩니다.
//! 스트림 종료는 예외가 아닌 명시적 변형([`Event::Eos`])으로 표현되며,
//! 다른 어떤 이벤트와도 같지 않습니다.

use std::fmt;

use serde_json::{Map, Value};

/// 이벤트 데이터 트리
///
/// 키는 평탄한 속성명 또는 점(dot) 경로이며, 값은 스칼라, 중첩 트리,
/// 순서 있는 시퀀스입니다. 점 경로 접근은 [`crate::maps`]를 사용합니다.
pub type DataMap = Map<String, Value>;

/// 원시 이벤트가 파싱 전에 반드시 가지고 있는 속성명
pub mod raw {
    /// 이벤트 소스 타입 (예: `infoblox:dhcp`)
    pub const SOURCE_TYPE: &str = "sourceType";
    /// 원본 이벤트 텍스트
    pub const RAW_EVENT: &str = "rawEvent";
    /// 테넌트 식별자
    pub const TENANT: &str = "tenant";
}

/// 파이프라인 이벤트 엔벨로프
///
/// 정상 이벤트는 데이터 트리를 감싸고, [`Event::Eos`]는 스트림 종료
/// 센티널입니다. 큐에 null이 들어가는 일은 타입 수준에서 불가능합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// 데이터 이벤트
    Data(DataMap),
    /// 스트림 종료 센티널 -- 이 뒤에는 어떤 이벤트도 넣지 않습니다
    Eos,
}

impl Event {
    /// 데이터 트리로부터 새 이벤트를 생성합니다.
    pub fn new(data: DataMap) -> Self {
        Event::Data(data)
    }

    /// 스트림 종료 센티널을 반환합니다.
    pub fn eos() -> Self {
        Event::Eos
    }

    /// 스트림 종료 센티널인지 확인합니다.
    pub fn is_eos(&self) -> bool {
        matches!(self, Event::Eos)
    }

    /// 데이터 트리에 대한 참조를 반환합니다. EOS이면 `None`입니다.
    pub fn data(&self) -> Option<&DataMap> {
        match self {
            Event::Data(data) => Some(data),
            Event::Eos => None,
        }
    }

    /// 엔벨로프를 소비하여 데이터 트리를 꺼냅니다. EOS이면 `None`입니다.
    pub fn into_data(self) -> Option<DataMap> {
        match self {
            Event::Data(data) => Some(data),
            Event::Eos => None,
        }
    }

    /// 이벤트의 소스 타입을 반환합니다.
    ///
    /// 데이터 이벤트이면서 `sourceType` 속성이 문자열인 경우에만 값이 있습니다.
    pub fn source_type(&self) -> Option<&str> {
        self.data()
            .and_then(|data| data.get(raw::SOURCE_TYPE))
            .and_then(Value::as_str)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Eos => write!(f, "Event[eos]"),
            Event::Data(data) => write!(
                f,
                "Event[source={} keys={}]",
                self.source_type().unwrap_or("-"),
                data.len(),
            ),
        }
    }
}
