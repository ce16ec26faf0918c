//! 파이프라인 생명주기 trait
//!
//! [`Pipeline`]은 파이프라인 구현체가 따르는 start/stop/health_check
//! 인터페이스입니다. 상위 레이어는 이 trait으로 파이프라인을 구동합니다.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::NormwireError;

/// 파이프라인 생명주기 trait
///
/// # 구현 예시
/// ```ignore
/// impl Pipeline for NormPipeline {
///     async fn start(&mut self) -> Result<(), NormwireError> {
///         // 워커 스폰, 큐 연결
///         Ok(())
///     }
///
///     async fn stop(&mut self) -> Result<(), NormwireError> {
///         // EOS 전파 후 워커 종료 대기
///         Ok(())
///     }
///
///     async fn health_check(&self) -> HealthStatus {
///         HealthStatus::Healthy
///     }
/// }
/// ```
pub trait Pipeline: Send + Sync {
    /// 파이프라인을 시작합니다.
    ///
    /// 이미 실행 중인 경우 `PipelineError::AlreadyRunning`을 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), NormwireError>> + Send;

    /// 파이프라인을 정지합니다.
    ///
    /// Graceful shutdown을 수행합니다. 진행 중인 이벤트를 드레인하고
    /// 워커 종료를 기다립니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), NormwireError>> + Send;

    /// 파이프라인의 현재 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 파이프라인 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 성능 저하 또는 부분적 장애 (서비스는 계속 동작)
    Degraded(String),
    /// 비정상 -- 서비스 불가 상태
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}
