use std::collections::BTreeMap;

use clap::{Args, ValueEnum};
use serde::Deserialize;

use pipeline::{ConsumerConfig, ProducerConfig};
use schema_registry::RegistryConfig;
use transport_kafka::KafkaSettings;

use super::error::AppError;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Kafka,
    /// Process-local broker, nothing leaves the process.
    Memory,
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub transport: Option<TransportKind>,
    #[serde(default)]
    pub kafka: KafkaSection,
    #[serde(default)]
    pub schema_registry: RegistrySection,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub producer: ProducerConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct KafkaSection {
    pub brokers: Option<String>,
    pub topic: Option<String>,
    pub group_id: Option<String>,
    pub delivery_timeout_ms: Option<u64>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegistrySection {
    /// No url: in-memory registry.
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_ms: Option<u64>,
}

pub fn load_config(path: &str) -> Result<Config, AppError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| AppError::Config(format!("cannot read config {path}: {e}")))?;
    parse_config(&content).map_err(|e| AppError::Config(format!("bad config {path}: {e}")))
}

fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    /// Path to the TOML config
    #[arg(long, default_value = "user-events.toml", env = "USER_EVENTS_CONFIG")]
    pub config: String,

    #[arg(long, value_enum, env = "USER_EVENTS_TRANSPORT")]
    pub transport: Option<TransportKind>,

    /// Comma-separated broker list
    #[arg(long, env = "USER_EVENTS_BROKERS")]
    pub brokers: Option<String>,

    #[arg(long, env = "USER_EVENTS_TOPIC")]
    pub topic: Option<String>,

    #[arg(long, env = "USER_EVENTS_GROUP_ID")]
    pub group_id: Option<String>,

    #[arg(long, env = "USER_EVENTS_SCHEMA_REGISTRY_URL")]
    pub schema_registry_url: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct ProduceArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Number of events to send
    #[arg(long, default_value_t = 10)]
    pub count: u64,
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Final configuration: config file < env/CLI.
#[derive(Debug)]
pub struct Effective {
    pub transport: TransportKind,
    pub topic: String,
    pub kafka: KafkaSettings,
    pub registry: Option<RegistryConfig>,
    pub consumer: ConsumerConfig,
    pub producer: ProducerConfig,
}

impl Effective {
    pub fn new(args: &CommonArgs) -> Result<Self, AppError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };
        Self::merge(args, cfg)
    }

    fn merge(args: &CommonArgs, cfg: Config) -> Result<Self, AppError> {
        let kafka = cfg.kafka;
        let registry = cfg.schema_registry;

        let eff = Self {
            transport: args.transport.or(cfg.transport).unwrap_or_default(),
            topic: args.topic.clone().or(kafka.topic).unwrap_or_else(|| "users".into()),
            kafka: KafkaSettings {
                brokers: args.brokers.clone().or(kafka.brokers).unwrap_or_else(|| "localhost:9092".into()),
                group_id: args.group_id.clone().or(kafka.group_id).unwrap_or_else(|| "user-events".into()),
                delivery_timeout_ms: kafka.delivery_timeout_ms.unwrap_or(5000),
                properties: kafka.properties,
            },
            registry: args.schema_registry_url.clone().or(registry.url).map(|url| RegistryConfig {
                url,
                username: registry.username,
                password: registry.password,
                timeout_ms: registry.timeout_ms.unwrap_or(10_000),
            }),
            consumer: cfg.consumer,
            producer: cfg.producer,
        };
        eff.validate()?;
        Ok(eff)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.topic.trim().is_empty() {
            return Err(AppError::Config("topic must not be empty".into()));
        }
        if self.kafka.group_id.trim().is_empty() {
            return Err(AppError::Config("group_id must not be empty".into()));
        }
        if self.kafka.brokers.trim().is_empty() {
            return Err(AppError::Config("brokers must not be empty".into()));
        }
        if self.consumer.poll_timeout_ms == 0 {
            return Err(AppError::Config("consumer.poll_timeout_ms must be positive".into()));
        }
        if self.producer.interval_ms == 0 {
            return Err(AppError::Config("producer.interval_ms must be positive".into()));
        }
        Ok(())
    }
}
