use std::sync::Arc;

use event_api::{DeliveryOutcome, EventError, MessagePublisher, ValueCodec};

/// Publisher bound to one topic.
///
/// No retries here: a failed publish is logged and returned to the caller as is.
pub struct EventProducer<T> {
    topic: String,
    publisher: Box<dyn MessagePublisher>,
    codec: Arc<dyn ValueCodec<T>>,
}

impl<T: Send + Sync + 'static> EventProducer<T> {
    pub fn new(
        topic: impl Into<String>,
        publisher: Box<dyn MessagePublisher>,
        codec: Arc<dyn ValueCodec<T>>,
    ) -> Self {
        Self { topic: topic.into(), publisher, codec }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Encode `record` and publish it under `key`.
    ///
    /// `None` fails with invalid-argument before the codec or the broker is touched.
    pub async fn produce(&self, key: &str, record: Option<&T>) -> Result<DeliveryOutcome, EventError> {
        let record = record.ok_or_else(|| EventError::invalid_argument("produce: record is required"))?;

        let payload = match self.codec.encode(&self.topic, record).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(topic = %self.topic, key, error = ?e, "failed to encode record");
                return Err(e);
            }
        };

        match self.publisher.publish(&self.topic, key, payload).await {
            Ok(outcome) => {
                tracing::info!(
                    topic = %outcome.topic,
                    partition = outcome.partition,
                    offset = outcome.offset,
                    key,
                    "delivered"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(topic = %self.topic, key, error = ?e, "delivery failed");
                Err(e)
            }
        }
    }
}
