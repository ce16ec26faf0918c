//! 이벤트 분배기 -- 원시 스트림을 소스 타입별 파이프라인으로 분배
//!
//! [`EventDemuxer`]는 이벤트의 `sourceType`으로 파서/트랜슬레이터를
//! 퍼지 조회하여, 소스 타입별 큐와 [`EventProcessor`] 워커를 게으르게
//! 생성하고 이벤트를 해당 큐로 넘깁니다.
//!
//! 소스 타입이 없거나 등록이 없는 이벤트는 그대로 반환되어 워커 루프가
//! raw 사이드 싱크로 전달합니다. 미등록 소스 타입 경고는 소스 타입당
//! 한 번만 남깁니다.
//!
//! EOS를 수신하면 모든 소스별 큐에 EOS를 정확히 한 번씩 전파하고
//! 처리기 워커들의 종료를 기다립니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use normwire_core::error::NormwireError;
use normwire_core::event::{DataMap, Event, raw};
use normwire_core::fuzzy::FuzzyMap;
use normwire_core::parser::Parser;
use normwire_core::queue::EventQueue;
use normwire_core::worker::{Transform, Transformer};
use normwire_schema::Enricher;
use normwire_translator::TranslatorsManager;

use crate::processor::{EventProcessor, Normalized, ProcessorMetrics, normalize};

/// 소스 타입별 분배기
///
/// 워커 루프의 기본 싱크는 raw 사이드 채널이며, 번역된 이벤트는
/// `event_sink`로 모입니다. 소스 타입 하나당 처리기는 프로세스 수명
/// 동안 최대 한 번 생성됩니다.
pub struct EventDemuxer {
    parsers: Arc<FuzzyMap<Arc<dyn Parser>>>,
    normalizers: Arc<FuzzyMap<Arc<TranslatorsManager>>>,
    enricher: Arc<Enricher>,
    /// 번역된 이벤트 싱크
    event_sink: EventQueue,
    /// 번역 미스 이벤트의 사이드 싱크 (처리기에 전달)
    raw_sink: EventQueue,
    /// 소스 타입 -> 소스별 큐 (게으른 생성)
    queues: HashMap<String, EventQueue>,
    /// 소스별 처리기 워커 핸들
    tasks: Vec<JoinHandle<()>>,
    token: CancellationToken,
    queue_capacity: usize,
    metrics: Arc<ProcessorMetrics>,
    /// 경고를 이미 남긴 미등록 소스 타입
    warned: HashSet<String>,
}

impl EventDemuxer {
    /// 새 분배기를 생성합니다.
    ///
    /// `token`은 소스별 처리기 워커들의 취소 신호로 전파됩니다.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        parsers: Arc<FuzzyMap<Arc<dyn Parser>>>,
        normalizers: Arc<FuzzyMap<Arc<TranslatorsManager>>>,
        enricher: Arc<Enricher>,
        event_sink: EventQueue,
        raw_sink: EventQueue,
        token: CancellationToken,
        queue_capacity: usize,
        metrics: Arc<ProcessorMetrics>,
    ) -> Self {
        let size = parsers.len() + 1;
        Self {
            parsers,
            normalizers,
            enricher,
            event_sink,
            raw_sink,
            queues: HashMap::with_capacity(size),
            tasks: Vec::new(),
            token,
            queue_capacity,
            metrics,
            warned: HashSet::new(),
        }
    }

    /// 이벤트 하나를 동기적으로 파싱/번역/보강합니다.
    ///
    /// 워커 경로와 달리 큐를 거치지 않는 단건 호출용입니다. 등록이 없거나
    /// 규칙이 매칭되지 않으면 `None`입니다.
    pub fn process_one(&self, data: DataMap) -> Option<DataMap> {
        let source = data
            .get(raw::SOURCE_TYPE)
            .and_then(serde_json::Value::as_str)?;

        let Some(parser) = self.parsers.get(source) else {
            tracing::warn!(source_type = %source, "missing event parser for source type");
            return None;
        };
        let Some(translators) = self.normalizers.get(source) else {
            tracing::warn!(source_type = %source, "missing event normalizer for source type");
            return None;
        };

        match normalize(&**parser, translators, &self.enricher, &self.metrics, data) {
            Normalized::Translated(translated) => Some(translated),
            Normalized::Miss(_) | Normalized::Dropped => None,
        }
    }

    /// 소스 타입의 큐를 얻습니다. 없으면 처리기 워커와 함께 생성합니다.
    fn sink_for(&mut self, source: &str) -> Option<EventQueue> {
        if let Some(queue) = self.queues.get(source) {
            return Some(queue.clone());
        }

        let parser = self.parsers.get(source);
        let normalizer = self.normalizers.get(source);

        let (Some(parser), Some(normalizer)) = (parser, normalizer) else {
            // 소스 타입당 한 번만 경고
            if self.warned.insert(source.to_owned()) {
                if parser.is_none() {
                    tracing::warn!(source_type = %source, "missing event parser for source type");
                }
                if normalizer.is_none() {
                    tracing::warn!(
                        source_type = %source,
                        "missing event normalizer for source type"
                    );
                }
            }
            return None;
        };

        let queue = EventQueue::new(self.queue_capacity);
        let processor = EventProcessor::new(
            Arc::clone(parser),
            Arc::clone(normalizer),
            Arc::clone(&self.enricher),
            self.raw_sink.clone(),
            Arc::clone(&self.metrics),
        );
        let worker = Transformer::new(
            format!("event-processor:{source}"),
            processor,
            queue.clone(),
            self.event_sink.clone(),
        );

        tracing::debug!(source_type = %source, "starting event processor");
        self.tasks.push(worker.spawn(self.token.child_token()));
        self.queues.insert(source.to_owned(), queue.clone());

        Some(queue)
    }
}

impl Transform for EventDemuxer {
    async fn process(&mut self, data: DataMap) -> Result<Option<DataMap>, NormwireError> {
        let Some(source) = data
            .get(raw::SOURCE_TYPE)
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
        else {
            tracing::warn!("missing source type in event");
            return Ok(Some(data));
        };

        match self.sink_for(&source) {
            Some(queue) => {
                queue.put(Event::Data(data)).await;
                Ok(None)
            }
            // 등록이 없는 이벤트는 raw 싱크로
            None => Ok(Some(data)),
        }
    }

    async fn terminated(&mut self) {
        for (source, queue) in &self.queues {
            tracing::debug!(source_type = %source, "propagating eos");
            queue.put(Event::eos()).await;
        }
        for task in self.tasks.drain(..) {
            if let Err(error) = task.await {
                tracing::warn!(error = %error, "event processor task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use normwire_core::maps;
    use normwire_schema::Catalog;
    use normwire_translator::Translator;
    use serde_json::json;

    fn number_parser() -> Arc<dyn Parser> {
        Arc::new(|text: &str| -> Result<DataMap, NormwireError> {
            let mut data = DataMap::new();
            let id = text
                .parse::<i64>()
                .map_err(|e| normwire_core::error::ParseError::Failed {
                    reason: e.to_string(),
                })?;
            data.insert("id".to_owned(), json!(id));
            Ok(data)
        })
    }

    fn id_translators(source_type: &str) -> Arc<TranslatorsManager> {
        let mut manager = TranslatorsManager::new(source_type);
        manager.put(
            "id",
            Translator::from_str(r#"{ "rules": [ { "id": { "@move": "id" } } ] }"#)
                .expect("compile"),
        );
        Arc::new(manager)
    }

    fn demuxer_for(source_types: &[&str], sink: EventQueue, raw_sink: EventQueue) -> EventDemuxer {
        let mut parsers = FuzzyMap::new();
        let mut normalizers = FuzzyMap::new();
        for source_type in source_types {
            parsers.insert(*source_type, number_parser());
            normalizers.insert(*source_type, id_translators(source_type));
        }

        EventDemuxer::new(
            Arc::new(parsers),
            Arc::new(normalizers),
            Arc::new(Enricher::minimal(Arc::new(Catalog::empty()))),
            sink,
            raw_sink,
            CancellationToken::new(),
            16,
            Arc::new(ProcessorMetrics::default()),
        )
    }

    fn raw_event(text: &str, source_type: &str) -> DataMap {
        let mut data = DataMap::new();
        data.insert(raw::RAW_EVENT.to_owned(), json!(text));
        data.insert(raw::TENANT.to_owned(), json!("Tenant"));
        data.insert(raw::SOURCE_TYPE.to_owned(), json!(source_type));
        data
    }

    #[tokio::test]
    async fn routes_to_lazily_created_processor() {
        let sink: EventQueue = EventQueue::new(16);
        let mut demuxer = demuxer_for(&["test"], sink.clone(), EventQueue::new(16));

        let routed = demuxer.process(raw_event("7", "test")).await.expect("ok");
        assert!(routed.is_none());
        assert_eq!(demuxer.queues.len(), 1);

        let event = sink.take().await;
        let data = event.data().expect("data event");
        assert_eq!(data.get("id"), Some(&json!(7)));
    }

    #[tokio::test]
    async fn one_processor_per_source_type() {
        let sink: EventQueue = EventQueue::new(16);
        let mut demuxer = demuxer_for(&["test"], sink.clone(), EventQueue::new(16));

        for i in 0..5 {
            demuxer
                .process(raw_event(&i.to_string(), "test"))
                .await
                .expect("ok");
        }
        assert_eq!(demuxer.queues.len(), 1);
        assert_eq!(demuxer.tasks.len(), 1);
    }

    #[tokio::test]
    async fn missing_source_type_returns_event_for_raw_sink() {
        let sink: EventQueue = EventQueue::new(16);
        let mut demuxer = demuxer_for(&["test"], sink, EventQueue::new(16));

        let mut data = DataMap::new();
        data.insert(raw::RAW_EVENT.to_owned(), json!("1"));

        let returned = demuxer.process(data.clone()).await.expect("ok");
        assert_eq!(returned, Some(data));
    }

    #[tokio::test]
    async fn unknown_source_type_returns_event_for_raw_sink() {
        let sink: EventQueue = EventQueue::new(16);
        let mut demuxer = demuxer_for(&["test"], sink, EventQueue::new(16));

        let data = raw_event("1", "unregistered");
        let returned = demuxer.process(data.clone()).await.expect("ok");
        assert_eq!(returned, Some(data));
        // 경고는 한 번만 (warned 집합에 기록)
        assert!(demuxer.warned.contains("unregistered"));
    }

    #[tokio::test]
    async fn fuzzy_source_type_matches_family_registration() {
        let sink: EventQueue = EventQueue::new(16);
        let mut demuxer = demuxer_for(&["syslog"], sink.clone(), EventQueue::new(16));

        let routed = demuxer
            .process(raw_event("3", "syslog:firewall:7"))
            .await
            .expect("ok");
        assert!(routed.is_none());

        let event = sink.take().await;
        let data = event.data().expect("data event");
        assert_eq!(data.get("id"), Some(&json!(3)));
        assert_eq!(
            maps::get_str(data, "unmapped.sourceType"),
            Some("syslog:firewall:7")
        );
    }

    #[tokio::test]
    async fn terminated_propagates_eos_to_every_queue() {
        let sink: EventQueue = EventQueue::new(16);
        let mut demuxer = demuxer_for(&["syslog:1", "syslog:2"], sink.clone(), EventQueue::new(16));

        demuxer.process(raw_event("1", "syslog:1")).await.expect("ok");
        demuxer.process(raw_event("2", "syslog:2")).await.expect("ok");
        demuxer.terminated().await;

        // 두 처리기 모두 드레인 후 각자 EOS를 싱크에 전달
        let mut data_events = 0;
        let mut eos_events = 0;
        while let Some(event) = sink.try_take() {
            if event.is_eos() {
                eos_events += 1;
            } else {
                data_events += 1;
            }
        }
        assert_eq!(data_events, 2);
        assert_eq!(eos_events, 2);
    }

    #[tokio::test]
    async fn process_one_translates_synchronously() {
        let sink: EventQueue = EventQueue::new(16);
        let demuxer = demuxer_for(&["test"], sink, EventQueue::new(16));

        let result = demuxer.process_one(raw_event("9", "test")).expect("match");
        assert_eq!(result.get("id"), Some(&json!(9)));
        assert_eq!(
            maps::get_str(&result, "unmapped.sourceType"),
            Some("test")
        );

        assert!(demuxer.process_one(raw_event("9", "unknown")).is_none());
    }
}
