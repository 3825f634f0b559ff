//! Kafka transport over rdkafka.

mod consumer;
mod publisher;

use std::collections::BTreeMap;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use serde::Deserialize;

use event_api::EventError;

pub use consumer::KafkaConsumer;
pub use publisher::KafkaPublisher;

/// Connection settings shared by the consumer and the publisher.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaSettings {
    /// Comma-separated `host:port` list.
    pub brokers: String,
    pub group_id: String,
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    /// Passed through to librdkafka as is.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_delivery_timeout_ms() -> u64 {
    5000
}

impl KafkaSettings {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Offsets are only ever committed by the event loop, so auto commit
    /// is forced off after the pass-through properties are applied.
    pub fn consumer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", "earliest");
        for (key, value) in &self.properties {
            config.set(key, value);
        }
        config
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false");
        config
    }

    pub fn producer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("message.timeout.ms", self.delivery_timeout_ms.to_string());
        for (key, value) in &self.properties {
            if !is_consumer_only(key) {
                config.set(key, value);
            }
        }
        config
    }
}

fn is_consumer_only(key: &str) -> bool {
    matches!(
        key,
        "group.id" | "auto.offset.reset" | "enable.auto.commit" | "enable.auto.offset.store" | "session.timeout.ms"
    )
}

fn transport_error(context: &str, e: KafkaError) -> EventError {
    EventError::transport(format!("kafka {context}: {e}"))
}
