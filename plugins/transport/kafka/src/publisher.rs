use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rdkafka::producer::{FutureProducer, FutureRecord, Producer};

use event_api::{DeliveryOutcome, EventError, MessagePublisher};

use crate::KafkaSettings;

pub struct KafkaPublisher {
    producer: FutureProducer,
    delivery_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(settings: &KafkaSettings) -> Result<Self, EventError> {
        let producer: FutureProducer = settings
            .producer_config()
            .create()
            .map_err(|e| EventError::config(format!("kafka producer: {e}")))?;
        tracing::info!(brokers = %settings.brokers, "kafka producer created");
        Ok(Self { producer, delivery_timeout: settings.delivery_timeout() })
    }
}

impl MessagePublisher for KafkaPublisher {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: &'a str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryOutcome, EventError>> + Send + 'a>> {
        Box::pin(async move {
            let record = FutureRecord::to(topic).key(key).payload(&payload);
            match self.producer.send(record, self.delivery_timeout).await {
                Ok((partition, offset)) => Ok(DeliveryOutcome { topic: topic.to_string(), partition, offset }),
                Err((e, _)) => Err(EventError::delivery(format!("kafka produce: {e}"))),
            }
        })
    }
}

impl Drop for KafkaPublisher {
    fn drop(&mut self) {
        if let Err(e) = self.producer.flush(self.delivery_timeout) {
            tracing::warn!(error = %e, "kafka producer flush failed");
        }
    }
}
