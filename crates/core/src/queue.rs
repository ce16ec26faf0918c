//! 이벤트 큐 — 블로킹 put/take를 지원하는 유한 FIFO
//!
//! [`EventQueue`]는 워커 사이의 유일한 통신 수단입니다. 큐가 가득 차면
//! `put`이, 비어 있으면 `take`가 대기하며, 이 두 지점이 파이프라인의
//! 유일한 중단점(suspension point)입니다. 용량이 가득 찬 큐는 `put`을
//! 막아 배압(backpressure)을 상류로 전파합니다.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::event::Event;

/// 이벤트 소스 -- `take`를 지원하는 모든 것
pub trait Source: Send + Sync {
    /// 다음 이벤트를 꺼냅니다. 큐가 비어 있으면 대기합니다.
    fn take(&self) -> impl Future<Output = Event> + Send;
}

/// 이벤트 싱크 -- `put`을 지원하는 모든 것
pub trait Sink: Send + Sync {
    /// 이벤트를 넣습니다. 큐가 가득 차면 대기합니다.
    fn put(&self, event: Event) -> impl Future<Output = ()> + Send;
}

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    /// 최대 용량. 0이면 무제한입니다.
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // 락 구간에서는 push/pop만 수행하므로 poisoning은 발생하지 않음
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 유한 FIFO 이벤트 큐
///
/// 핸들은 복제 가능하며 모든 복제본이 같은 큐를 공유합니다.
/// 단일 소비자에게 제출 순서 그대로 전달되고, 대기자는 FIFO 순서로
/// 깨어납니다. EOS 센티널도 일반 원소처럼 넣고 꺼내지만, 관례상 EOS
/// 이후에는 어떤 원소도 넣지 않습니다.
pub struct EventQueue<T = Event> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send> EventQueue<T> {
    /// 지정한 용량의 큐를 생성합니다. 용량 0은 무제한을 의미합니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::new()),
                capacity,
                not_empty: Notify::new(),
                not_full: Notify::new(),
            }),
        }
    }

    /// 무제한 큐를 생성합니다.
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// 원소를 넣습니다. 큐가 가득 차면 자리가 날 때까지 대기합니다.
    pub async fn put(&self, item: T) {
        let mut item = item;
        loop {
            match self.try_put(item) {
                Ok(()) => return,
                Err(rejected) => item = rejected,
            }
            self.inner.not_full.notified().await;
        }
    }

    /// 대기 없이 원소를 넣습니다. 큐가 가득 차면 원소를 되돌려줍니다.
    fn try_put(&self, item: T) -> Result<(), T> {
        let mut items = self.inner.lock();
        if self.inner.capacity == 0 || items.len() < self.inner.capacity {
            items.push_back(item);
            drop(items);
            self.inner.not_empty.notify_one();
            Ok(())
        } else {
            Err(item)
        }
    }

    /// 다음 원소를 꺼냅니다. 큐가 비어 있으면 원소가 들어올 때까지 대기합니다.
    pub async fn take(&self) -> T {
        loop {
            {
                let mut items = self.inner.lock();
                if let Some(item) = items.pop_front() {
                    drop(items);
                    self.inner.not_full.notify_one();
                    return item;
                }
            }
            self.inner.not_empty.notified().await;
        }
    }

    /// 대기 없이 다음 원소를 꺼냅니다. 비어 있으면 `None`입니다.
    pub fn try_take(&self) -> Option<T> {
        let item = self.inner.lock().pop_front();
        if item.is_some() {
            self.inner.not_full.notify_one();
        }
        item
    }

    /// 현재 큐에 들어 있는 원소 수의 스냅샷을 반환합니다.
    pub fn available(&self) -> usize {
        self.inner.lock().len()
    }

    /// 큐가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// 큐의 최대 용량을 반환합니다. 0은 무제한입니다.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// 큐 사용률을 0.0~1.0 범위로 반환합니다. 무제한 큐는 항상 0.0입니다.
    pub fn utilization(&self) -> f64 {
        if self.inner.capacity == 0 {
            return 0.0;
        }
        self.available() as f64 / self.inner.capacity as f64
    }
}

impl Source for EventQueue<Event> {
    async fn take(&self) -> Event {
        EventQueue::take(self).await
    }
}

impl Sink for EventQueue<Event> {
    async fn put(&self, event: Event) {
        EventQueue::put(self, event).await
    }
}
