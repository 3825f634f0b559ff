use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub mod error;
pub mod record;

pub use error::{ErrorKind, EventError};
pub use record::{FieldDescriptor, FieldType, FieldValue, SchemaRecord, UserEvent};

// ════════════════════════════════════════════════════════════════
//  Transport types
// ════════════════════════════════════════════════════════════════

/// Message pulled from the upstream broker, detached from the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    /// `None` for tombstones.
    pub payload: Option<Vec<u8>>,
    /// Broker timestamp in Unix ms, when available.
    pub ts_ms: Option<i64>,
}

/// Result of a successful publish. Informational only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

// ════════════════════════════════════════════════════════════════
//  Transport traits
// ════════════════════════════════════════════════════════════════

/// Subscribing side of the broker. Owned exclusively by one event loop.
pub trait MessageConsumer: Send {
    /// Bind to a single topic. Called once, before the first `consume`.
    fn subscribe(&mut self, topic: &str) -> Result<(), EventError>;

    /// Wait for the next message. `Ok(None)` = timeout elapsed.
    ///
    /// The returned future must be safe to drop at any await point:
    /// the loop drops it when cancellation wins the race.
    fn consume(
        &mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ConsumedMessage>, EventError>> + Send + '_>>;

    /// Mark everything up to and including `message` as processed.
    ///
    /// Implementations backed by a blocking client must not block the
    /// calling worker thread.
    fn commit<'a>(
        &'a mut self,
        message: &'a ConsumedMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventError>> + Send + 'a>>;

    /// Release the connection. Called exactly once, possibly from `Drop`.
    fn close(&mut self);
}

/// Publishing side of the broker. Owned exclusively by one producer.
pub trait MessagePublisher: Send + Sync {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: &'a str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryOutcome, EventError>> + Send + 'a>>;
}

/// Value serializer/deserializer bound to the broker's topic.
///
/// Implementations may consult a shared schema registry, hence async.
pub trait ValueCodec<T>: Send + Sync {
    fn encode<'a>(
        &'a self,
        topic: &'a str,
        value: &'a T,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, EventError>> + Send + 'a>>;

    fn decode<'a>(
        &'a self,
        topic: &'a str,
        data: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<T, EventError>> + Send + 'a>>;
}

// ════════════════════════════════════════════════════════════════
//  Handler
// ════════════════════════════════════════════════════════════════

/// Callback invoked once per consumed record.
///
/// `None` is the absence value (a tombstone); implementations must reject
/// it with an invalid-argument error.
pub trait EventHandler<T>: Send + Sync {
    fn handle<'a>(
        &'a self,
        record: Option<&'a T>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventError>> + Send + 'a>>;
}

/// Current time in Unix epoch milliseconds.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
