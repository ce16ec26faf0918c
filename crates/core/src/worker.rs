//! 트랜스포머 워커 -- Source를 드레인하여 Sink로 전달하는 장수명 루프
//!
//! [`Transformer`]는 하나의 논리적 실행 흐름(tokio 태스크)으로,
//! 업스트림 큐에서 이벤트를 꺼내 변환하고 다운스트림 큐로 전달합니다.
//!
//! # 루프 규약
//! 1. EOS를 꺼내면 [`Transform::terminated`] 훅을 호출하고, 자신의 싱크에
//!    EOS를 정확히 한 번 전달한 뒤 종료합니다.
//! 2. 변환 결과가 `Some`이면 싱크에 넣고, `None`이면 드롭합니다.
//! 3. 변환 에러는 경고 로그를 남기고 이벤트를 드롭하며, 루프는 계속됩니다.
//! 4. 취소 토큰이 발동하면 EOS 전파 없이 즉시 종료합니다. 이후의
//!    다운스트림 드레인은 보장되지 않습니다.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::NormwireError;
use crate::event::{DataMap, Event};
use crate::queue::{Sink, Source};

/// 워커가 수행하는 변환 로직
///
/// 상속 대신 합성으로 모델링합니다. 워커 루프는 [`Transformer`]가 소유하고,
/// 변환 본체와 종료 훅만 이 trait으로 주입합니다.
pub trait Transform: Send {
    /// 데이터 이벤트 하나를 변환합니다.
    ///
    /// `Ok(Some(_))`은 싱크로 전달되고, `Ok(None)`은 드롭됩니다
    /// (이미 다른 큐로 전달했거나 버리는 경우).
    /// `Err`는 경고 로그 후 드롭되며 루프는 계속됩니다.
    fn process(
        &mut self,
        data: DataMap,
    ) -> impl Future<Output = Result<Option<DataMap>, NormwireError>> + Send;

    /// EOS 수신 시 호출되는 종료 훅
    ///
    /// 자신이 소유한 다운스트림 큐들에 EOS를 전파하는 지점입니다.
    /// 워커의 기본 싱크에 대한 EOS 전달은 루프가 수행하므로 여기서
    /// 반복할 필요가 없습니다.
    fn terminated(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// 장수명 워커 -- Source 하나와 Sink 하나를 묶습니다.
pub struct Transformer<T, S, K> {
    name: String,
    transform: T,
    source: S,
    sink: K,
}

impl<T, S, K> Transformer<T, S, K>
where
    T: Transform + 'static,
    S: Source + 'static,
    K: Sink + 'static,
{
    /// 새 워커를 생성합니다.
    pub fn new(name: impl Into<String>, transform: T, source: S, sink: K) -> Self {
        Self {
            name: name.into(),
            transform,
            source,
            sink,
        }
    }

    /// 워커 루프를 tokio 태스크로 스폰합니다.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    /// 워커 루프를 실행합니다. EOS 또는 취소 시 반환합니다.
    pub async fn run(mut self, token: CancellationToken) {
        tracing::debug!(worker = %self.name, "worker started");

        loop {
            let event = tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!(worker = %self.name, "interrupted, exiting without eos");
                    return;
                }
                event = self.source.take() => event,
            };

            match event {
                Event::Eos => {
                    tracing::debug!(worker = %self.name, "end of stream");
                    self.transform.terminated().await;

                    tokio::select! {
                        _ = token.cancelled() => {
                            tracing::info!(worker = %self.name, "interrupted during shutdown");
                        }
                        _ = self.sink.put(Event::Eos) => {}
                    }
                    return;
                }
                Event::Data(data) => match self.transform.process(data).await {
                    Ok(Some(output)) => {
                        tokio::select! {
                            _ = token.cancelled() => {
                                tracing::info!(worker = %self.name, "interrupted, exiting without eos");
                                return;
                            }
                            _ = self.sink.put(Event::Data(output)) => {}
                        }
                    }
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!(worker = %self.name, error = %error, "event dropped");
                    }
                },
            }
        }
    }
}
