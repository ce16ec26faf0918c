//! 이벤트 처리기 -- 소스 타입 하나를 담당하는 파이프라인 단계
//!
//! [`EventProcessor`]는 `(파서, 트랜슬레이터 모음, 보강기)` 하나에
//! 바인딩되어 원시 이벤트를 `파싱 -> 번역 -> 보강` 순서로 처리합니다.
//!
//! 규칙이 소비하지 않은 파싱 결과와 원본 `sourceType`/`tenant`/`rawEvent`는
//! `unmapped` 아래에 보존됩니다. 파싱 실패는 드롭되고, 어떤 규칙도
//! 매칭되지 않은 이벤트는 원본 그대로 raw 사이드 싱크로 전달됩니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use normwire_core::error::NormwireError;
use normwire_core::event::{DataMap, Event, raw};
use normwire_core::maps;
use normwire_core::parser::Parser;
use normwire_core::queue::EventQueue;
use normwire_core::worker::Transform;
use normwire_schema::Enricher;
use normwire_schema::dictionary;
use normwire_translator::TranslatorsManager;

/// 파이프라인 전체가 공유하는 처리 카운터
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    /// 번역까지 성공한 이벤트 수
    pub processed: AtomicU64,
    /// 파싱 실패 수
    pub parse_errors: AtomicU64,
    /// 매칭된 규칙이 없어 raw 싱크로 우회한 수
    pub translate_misses: AtomicU64,
}

impl ProcessorMetrics {
    /// 처리 성공 수를 반환합니다.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// 파싱 실패 수를 반환합니다.
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    /// 번역 미스 수를 반환합니다.
    pub fn translate_misses(&self) -> u64 {
        self.translate_misses.load(Ordering::Relaxed)
    }
}

/// 정규화 한 건의 결과
pub(crate) enum Normalized {
    /// 번역/보강된 이벤트
    Translated(DataMap),
    /// 어떤 규칙도 매칭되지 않음 -- 원본 이벤트를 그대로 돌려줌
    Miss(DataMap),
    /// 파싱 실패 또는 원본 텍스트 없음
    Dropped,
}

/// 소스 타입 하나를 담당하는 이벤트 처리기
pub struct EventProcessor {
    parser: Arc<dyn Parser>,
    translators: Arc<TranslatorsManager>,
    enricher: Arc<Enricher>,
    /// 번역 미스 이벤트의 사이드 싱크
    raw_sink: EventQueue,
    metrics: Arc<ProcessorMetrics>,
}

impl EventProcessor {
    /// 새 처리기를 생성합니다.
    pub fn new(
        parser: Arc<dyn Parser>,
        translators: Arc<TranslatorsManager>,
        enricher: Arc<Enricher>,
        raw_sink: EventQueue,
        metrics: Arc<ProcessorMetrics>,
    ) -> Self {
        Self {
            parser,
            translators,
            enricher,
            raw_sink,
            metrics,
        }
    }
}

impl Transform for EventProcessor {
    async fn process(&mut self, data: DataMap) -> Result<Option<DataMap>, NormwireError> {
        match normalize(
            &*self.parser,
            &self.translators,
            &self.enricher,
            &self.metrics,
            data,
        ) {
            Normalized::Translated(translated) => Ok(Some(translated)),
            Normalized::Miss(original) => {
                // 번역 전 원본을 raw 사이드 싱크로
                self.raw_sink.put(Event::Data(original)).await;
                Ok(None)
            }
            Normalized::Dropped => Ok(None),
        }
    }
}

/// 원시 이벤트 하나를 정규화합니다: 파싱 -> 번역 -> unmapped 보존 -> 보강.
pub(crate) fn normalize(
    parser: &dyn Parser,
    translators: &TranslatorsManager,
    enricher: &Enricher,
    metrics: &ProcessorMetrics,
    mut data: DataMap,
) -> Normalized {
    let Some(text) = data.get(raw::RAW_EVENT).and_then(Value::as_str).map(str::to_owned)
    else {
        tracing::debug!("event has no raw event text, dropping");
        return Normalized::Dropped;
    };

    let mut parsed = match parser.parse(&text) {
        Ok(parsed) => parsed,
        Err(error) => {
            metrics.parse_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                source_type = %translators.source_type(),
                error = %error,
                "failed to parse raw event, dropping"
            );
            return Normalized::Dropped;
        }
    };

    let Some(mut translated) = translators.translate(&mut parsed) else {
        metrics.translate_misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            source_type = %translators.source_type(),
            "no rule matched"
        );
        return Normalized::Miss(data);
    };

    // 규칙이 소비하지 않은 파싱 결과 + 원본 식별 속성을 unmapped에 보존
    let mut unmapped = parsed;
    if let Some(source_type) = data.remove(raw::SOURCE_TYPE) {
        unmapped.insert(raw::SOURCE_TYPE.to_owned(), source_type);
    }
    if let Some(tenant) = data.remove(raw::TENANT) {
        unmapped.insert(raw::TENANT.to_owned(), tenant);
    }
    unmapped.insert(raw::RAW_EVENT.to_owned(), Value::String(text));
    maps::merge_at(&mut translated, dictionary::UNMAPPED, unmapped);

    metrics.processed.fetch_add(1, Ordering::Relaxed);

    Normalized::Translated(enricher.enrich(translated))
}
