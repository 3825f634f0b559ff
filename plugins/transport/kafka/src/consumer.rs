use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::{Message, Offset, TopicPartitionList};

use event_api::{ConsumedMessage, EventError, MessageConsumer};

use crate::{KafkaSettings, transport_error};

/// `StreamConsumer` with manual, synchronous offset commits.
///
/// librdkafka's sync commit and consumer close block on a broker round
/// trip; both run on the blocking pool.
pub struct KafkaConsumer {
    /// `None` once closed.
    consumer: Option<Arc<StreamConsumer>>,
    group_id: String,
}

impl KafkaConsumer {
    pub fn new(settings: &KafkaSettings) -> Result<Self, EventError> {
        let consumer: StreamConsumer = settings
            .consumer_config()
            .create()
            .map_err(|e| EventError::config(format!("kafka consumer: {e}")))?;
        tracing::info!(brokers = %settings.brokers, group_id = %settings.group_id, "kafka consumer created");
        Ok(Self { consumer: Some(Arc::new(consumer)), group_id: settings.group_id.clone() })
    }

    fn client(&self) -> Result<&Arc<StreamConsumer>, EventError> {
        self.consumer
            .as_ref()
            .ok_or_else(|| EventError::transport("kafka: consumer is closed"))
    }
}

impl MessageConsumer for KafkaConsumer {
    fn subscribe(&mut self, topic: &str) -> Result<(), EventError> {
        self.client()?
            .subscribe(&[topic])
            .map_err(|e| transport_error("subscribe", e))
    }

    fn consume(
        &mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ConsumedMessage>, EventError>> + Send + '_>> {
        Box::pin(async move {
            let consumer = self.client()?;
            let message = match tokio::time::timeout(timeout, consumer.recv()).await {
                Err(_) => return Ok(None),
                Ok(result) => result.map_err(|e| transport_error("consume", e))?,
            };
            Ok(Some(ConsumedMessage {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                payload: message.payload().map(<[u8]>::to_vec),
                ts_ms: message.timestamp().to_millis(),
            }))
        })
    }

    fn commit<'a>(
        &'a mut self,
        message: &'a ConsumedMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventError>> + Send + 'a>> {
        Box::pin(async move {
            let consumer = self.client()?.clone();
            let mut offsets = TopicPartitionList::new();
            offsets
                .add_partition_offset(&message.topic, message.partition, Offset::Offset(message.offset + 1))
                .map_err(|e| transport_error("commit", e))?;
            tokio::task::spawn_blocking(move || consumer.commit(&offsets, CommitMode::Sync))
                .await
                .map_err(|e| EventError::transport(format!("kafka commit: {e}")))?
                .map_err(|e| transport_error("commit", e))
        })
    }

    fn close(&mut self) {
        let Some(consumer) = self.consumer.take() else {
            return;
        };
        consumer.unsubscribe();
        // Dropping the last handle runs rd_kafka_consumer_close.
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || drop(consumer));
            }
            Err(_) => drop(consumer),
        }
        tracing::info!(group_id = %self.group_id, "kafka consumer closed");
    }
}
