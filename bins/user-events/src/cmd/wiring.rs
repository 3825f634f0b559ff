use std::sync::Arc;

use codec_avro::AvroCodec;
use event_api::{MessageConsumer, MessagePublisher, UserEvent, ValueCodec};
use pipeline::memory::MemoryBroker;
use schema_registry::{CachedSchemaRegistry, HttpSchemaRegistry, MemorySchemaRegistry, SchemaRegistry};
use transport_kafka::{KafkaConsumer, KafkaPublisher, KafkaSettings};

use super::config::{Effective, TransportKind};
use super::error::AppError;

/// One registry client per process, shared by both codec paths.
pub fn registry(eff: &Effective) -> Result<Arc<dyn SchemaRegistry>, AppError> {
    match &eff.registry {
        Some(cfg) => {
            let http = HttpSchemaRegistry::new(cfg)?;
            tracing::info!(url = %cfg.url, "using schema registry");
            Ok(Arc::new(CachedSchemaRegistry::new(http)))
        }
        None => {
            tracing::warn!("no schema_registry.url configured, using in-memory registry");
            Ok(Arc::new(MemorySchemaRegistry::new()))
        }
    }
}

pub fn codec(registry: Arc<dyn SchemaRegistry>) -> Result<Arc<dyn ValueCodec<UserEvent>>, AppError> {
    Ok(Arc::new(AvroCodec::<UserEvent>::new(registry)?))
}

/// Source of consumers and publishers for the configured transport.
pub enum Broker {
    Kafka(KafkaSettings),
    /// Broker and consumer group.
    Memory(MemoryBroker, String),
}

impl Broker {
    pub fn new(eff: &Effective) -> Self {
        match eff.transport {
            TransportKind::Kafka => Broker::Kafka(eff.kafka.clone()),
            TransportKind::Memory => {
                tracing::info!("using in-memory transport");
                Broker::Memory(MemoryBroker::new(), eff.kafka.group_id.clone())
            }
        }
    }

    pub fn consumer(&self) -> Result<Box<dyn MessageConsumer>, AppError> {
        let consumer: Box<dyn MessageConsumer> = match self {
            Broker::Kafka(settings) => Box::new(KafkaConsumer::new(settings)?),
            Broker::Memory(broker, group_id) => Box::new(broker.consumer(group_id.as_str())),
        };
        Ok(consumer)
    }

    pub fn publisher(&self) -> Result<Box<dyn MessagePublisher>, AppError> {
        let publisher: Box<dyn MessagePublisher> = match self {
            Broker::Kafka(settings) => Box::new(KafkaPublisher::new(settings)?),
            Broker::Memory(broker, _) => Box::new(broker.publisher()),
        };
        Ok(publisher)
    }
}
