#![doc = include_str!("../README.md")]

pub mod error;
pub mod event;
pub mod fuzzy;
pub mod lifecycle;
pub mod maps;
pub mod parser;
pub mod queue;
pub mod worker;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{
    ConfigError, NormwireError, ParseError, PipelineError, RuleError, SchemaError,
};

// 이벤트
pub use event::{DataMap, Event};

// 큐와 경계 trait
pub use queue::{EventQueue, Sink, Source};

// 파서 경계
pub use parser::Parser;

// 워커
pub use worker::{Transform, Transformer};

// 생명주기
pub use lifecycle::{HealthStatus, Pipeline};

// 퍼지 맵
pub use fuzzy::FuzzyMap;
