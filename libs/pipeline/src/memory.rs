//! Process-local broker for `transport = "memory"` and for tests.
//!
//! Every topic is a single partition (0). Consumers of one group share a
//! committed offset; a new consumer resumes from it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use event_api::{ConsumedMessage, DeliveryOutcome, EventError, MessageConsumer, MessagePublisher, now_ms};
use tokio::sync::Notify;

const PARTITION: i32 = 0;

struct StoredMessage {
    key: String,
    payload: Vec<u8>,
    ts_ms: i64,
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Vec<StoredMessage>>,
    /// (group, topic) → next offset to read.
    committed: HashMap<(String, String), i64>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<BrokerState>,
    appended: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBroker
// ═══════════════════════════════════════════════════════════════

#[derive(Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publisher(&self) -> MemoryPublisher {
        MemoryPublisher { shared: self.shared.clone() }
    }

    pub fn consumer(&self, group_id: impl Into<String>) -> MemoryConsumer {
        MemoryConsumer {
            shared: self.shared.clone(),
            group_id: group_id.into(),
            topic: None,
            position: 0,
            closed: false,
        }
    }

    /// Number of messages ever appended to `topic`.
    pub fn log_len(&self, topic: &str) -> usize {
        self.shared.lock().topics.get(topic).map_or(0, Vec::len)
    }

    /// Next offset `group_id` will read on `topic`, if it has committed anything.
    pub fn committed(&self, group_id: &str, topic: &str) -> Option<i64> {
        self.shared
            .lock()
            .committed
            .get(&(group_id.to_string(), topic.to_string()))
            .copied()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Publisher
// ═══════════════════════════════════════════════════════════════

pub struct MemoryPublisher {
    shared: Arc<Shared>,
}

impl MessagePublisher for MemoryPublisher {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: &'a str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryOutcome, EventError>> + Send + 'a>> {
        Box::pin(async move {
            let offset = {
                let mut state = self.shared.lock();
                let log = state.topics.entry(topic.to_string()).or_default();
                log.push(StoredMessage { key: key.to_string(), payload, ts_ms: now_ms() });
                (log.len() - 1) as i64
            };
            self.shared.appended.notify_waiters();
            Ok(DeliveryOutcome { topic: topic.to_string(), partition: PARTITION, offset })
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Consumer
// ═══════════════════════════════════════════════════════════════

pub struct MemoryConsumer {
    shared: Arc<Shared>,
    group_id: String,
    topic: Option<String>,
    position: i64,
    closed: bool,
}

impl MemoryConsumer {
    fn poll(&mut self) -> Result<Option<ConsumedMessage>, EventError> {
        if self.closed {
            return Err(EventError::transport("memory: consumer is closed"));
        }
        let topic = self
            .topic
            .as_ref()
            .ok_or_else(|| EventError::new("memory: consume before subscribe"))?;

        let state = self.shared.lock();
        let Some(stored) = state.topics.get(topic).and_then(|log| log.get(self.position as usize)) else {
            return Ok(None);
        };
        let message = ConsumedMessage {
            topic: topic.clone(),
            partition: PARTITION,
            offset: self.position,
            key: Some(stored.key.clone()),
            payload: Some(stored.payload.clone()),
            ts_ms: Some(stored.ts_ms),
        };
        drop(state);
        self.position += 1;
        Ok(Some(message))
    }
}

impl MessageConsumer for MemoryConsumer {
    fn subscribe(&mut self, topic: &str) -> Result<(), EventError> {
        let key = (self.group_id.clone(), topic.to_string());
        self.position = self.shared.lock().committed.get(&key).copied().unwrap_or(0);
        self.topic = Some(topic.to_string());
        tracing::debug!(topic, group_id = %self.group_id, position = self.position, "memory: subscribed");
        Ok(())
    }

    fn consume(
        &mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ConsumedMessage>, EventError>> + Send + '_>> {
        let shared = self.shared.clone();
        Box::pin(async move {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                // Register before checking so an append in between still wakes us.
                let appended = shared.appended.notified();
                if let Some(message) = self.poll()? {
                    return Ok(Some(message));
                }
                if tokio::time::timeout_at(deadline, appended).await.is_err() {
                    return Ok(None);
                }
            }
        })
    }

    fn commit<'a>(
        &'a mut self,
        message: &'a ConsumedMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventError>> + Send + 'a>> {
        Box::pin(async move {
            if self.closed {
                return Err(EventError::transport("memory: consumer is closed"));
            }
            let key = (self.group_id.clone(), message.topic.clone());
            self.shared.lock().committed.insert(key, message.offset + 1);
            Ok(())
        })
    }

    fn close(&mut self) {
        self.closed = true;
        tracing::debug!(group_id = %self.group_id, "memory: consumer closed");
    }
}
