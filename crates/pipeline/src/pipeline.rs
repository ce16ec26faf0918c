//! 파이프라인 오케스트레이션 -- 입력 큐부터 출력 싱크까지의 배선
//!
//! [`NormPipeline`]은 core의 [`Pipeline`] trait을 구현하여
//! start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! input -> EventDemuxer -> {per-source queue -> EventProcessor} -> translated
//!               |                                                      ^
//!               +-> raw (미등록/소스 타입 없음)               parse/translate/enrich
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use normwire_core::error::{NormwireError, PipelineError};
use normwire_core::event::Event;
use normwire_core::fuzzy::FuzzyMap;
use normwire_core::lifecycle::{HealthStatus, Pipeline};
use normwire_core::parser::Parser;
use normwire_core::queue::EventQueue;
use normwire_core::worker::Transformer;
use normwire_schema::{Catalog, Enricher};
use normwire_translator::TranslatorsManager;

use crate::config::PipelineConfig;
use crate::demuxer::EventDemuxer;
use crate::error::NormPipelineError;
use crate::processor::ProcessorMetrics;
use crate::registry::Parsers;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 이벤트 정규화 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use normwire_pipeline::{NormPipelineBuilder, PipelineConfig};
///
/// let mut pipeline = NormPipelineBuilder::new()
///     .config(config)
///     .parsers(parsers)
///     .normalizers(managers)
///     .catalog(catalog)
///     .build()?;
///
/// pipeline.start().await?;
/// let input = pipeline.input();
/// let translated = pipeline.translated();
/// ```
pub struct NormPipeline {
    config: PipelineConfig,
    state: PipelineState,
    parsers: Arc<FuzzyMap<Arc<dyn Parser>>>,
    normalizers: Arc<FuzzyMap<Arc<TranslatorsManager>>>,
    enricher: Arc<Enricher>,
    /// 원시 이벤트 입력 큐
    input: EventQueue,
    /// 번역된 이벤트 싱크
    translated: EventQueue,
    /// 번역되지 못한 이벤트의 사이드 싱크
    raw: EventQueue,
    metrics: Arc<ProcessorMetrics>,
    token: CancellationToken,
    /// 분배기 워커 핸들
    task: Option<JoinHandle<()>>,
}

impl NormPipeline {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 원시 이벤트를 넣을 입력 큐 핸들을 반환합니다.
    pub fn input(&self) -> EventQueue {
        self.input.clone()
    }

    /// 번역된 이벤트를 꺼낼 싱크 핸들을 반환합니다.
    pub fn translated(&self) -> EventQueue {
        self.translated.clone()
    }

    /// raw 사이드 싱크 핸들을 반환합니다.
    pub fn raw(&self) -> EventQueue {
        self.raw.clone()
    }

    /// 번역까지 성공한 이벤트 수를 반환합니다.
    pub fn processed_count(&self) -> u64 {
        self.metrics.processed()
    }

    /// 파싱 실패 수를 반환합니다.
    pub fn parse_error_count(&self) -> u64 {
        self.metrics.parse_errors()
    }

    /// 번역 미스 수를 반환합니다.
    pub fn translate_miss_count(&self) -> u64 {
        self.metrics.translate_misses()
    }

    /// 워커 경로를 거치지 않는 단건 정규화 호출용 분배기를 만듭니다.
    pub fn demuxer(&self) -> EventDemuxer {
        EventDemuxer::new(
            Arc::clone(&self.parsers),
            Arc::clone(&self.normalizers),
            Arc::clone(&self.enricher),
            self.translated.clone(),
            self.raw.clone(),
            self.token.child_token(),
            self.config.queue_capacity,
            Arc::clone(&self.metrics),
        )
    }

    /// 취소 토큰을 반환합니다. 발동 시 모든 워커가 EOS 전파 없이
    /// 즉시 종료됩니다.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Pipeline for NormPipeline {
    async fn start(&mut self) -> Result<(), NormwireError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(
            parsers = self.parsers.len(),
            normalizers = self.normalizers.len(),
            "starting normalization pipeline"
        );

        let demuxer = self.demuxer();
        let worker = Transformer::new(
            "event-demuxer",
            demuxer,
            self.input.clone(),
            self.raw.clone(),
        );
        self.task = Some(worker.spawn(self.token.child_token()));

        self.state = PipelineState::Running;
        tracing::info!("normalization pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), NormwireError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping normalization pipeline");

        // EOS가 분배기를 지나 모든 소스별 큐와 출력 싱크까지 전파됨
        self.input.put(Event::eos()).await;

        if let Some(task) = self.task.take() {
            task.await.map_err(|e| {
                NormwireError::Pipeline(PipelineError::InitFailed(format!(
                    "demuxer task failed: {e}"
                )))
            })?;
        }

        self.state = PipelineState::Stopped;
        tracing::info!("normalization pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                let utilization = self.input.utilization();
                if utilization > 0.9 {
                    HealthStatus::Degraded(format!(
                        "input queue utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 파이프라인 빌더
///
/// 파서/트랜슬레이터 레지스트리와 스키마 카탈로그를 받아 큐를 만들고
/// 배선합니다.
pub struct NormPipelineBuilder {
    config: PipelineConfig,
    parsers: Parsers,
    normalizers: Vec<TranslatorsManager>,
    catalog: Option<Arc<Catalog>>,
}

impl NormPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            parsers: Parsers::new(),
            normalizers: Vec::new(),
            catalog: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 파서 레지스트리를 지정합니다.
    pub fn parsers(mut self, parsers: Parsers) -> Self {
        self.parsers = parsers;
        self
    }

    /// 트랜슬레이터 모음들을 지정합니다. 각 모음의 소스 타입이 퍼지 맵의
    /// 키가 됩니다.
    pub fn normalizers(mut self, normalizers: Vec<TranslatorsManager>) -> Self {
        self.normalizers = normalizers;
        self
    }

    /// 트랜슬레이터 모음 하나를 추가합니다.
    pub fn normalizer(mut self, normalizer: TranslatorsManager) -> Self {
        self.normalizers.push(normalizer);
        self
    }

    /// 보강에 사용할 스키마 카탈로그를 지정합니다.
    ///
    /// 지정하지 않으면 빈 카탈로그로 보강이 통과합니다.
    pub fn catalog(mut self, catalog: Arc<Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<NormPipeline, NormPipelineError> {
        self.config.validate()?;

        let separator = self.config.fuzzy_key_separator;
        let parsers = self.parsers.into_fuzzy(separator);

        let mut normalizers = FuzzyMap::with_separator(separator);
        for manager in self.normalizers {
            normalizers.insert(manager.source_type().to_owned(), Arc::new(manager));
        }

        let catalog = self.catalog.unwrap_or_else(|| Arc::new(Catalog::empty()));
        let enricher = Enricher::new(
            catalog,
            self.config.add_enum_siblings,
            self.config.add_observables,
        );

        let capacity = self.config.queue_capacity;

        Ok(NormPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            parsers: Arc::new(parsers),
            normalizers: Arc::new(normalizers),
            enricher: Arc::new(enricher),
            input: EventQueue::new(capacity),
            translated: EventQueue::new(capacity),
            raw: EventQueue::new(capacity),
            metrics: Arc::new(ProcessorMetrics::default()),
            token: CancellationToken::new(),
            task: None,
        })
    }
}

impl Default for NormPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
