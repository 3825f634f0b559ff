//! Schema registry clients.
//!
//! A registry maps `(subject, schema)` to a numeric id on the write path
//! and an id back to the schema on the read path. Build one client per
//! process, wrap it in [`CachedSchemaRegistry`], and share the `Arc`
//! between the producing and consuming codecs.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

mod cached;
pub mod error;
mod http;
mod memory;

pub use cached::CachedSchemaRegistry;
pub use error::RegistryError;
pub use http::HttpSchemaRegistry;
pub use memory::MemorySchemaRegistry;

pub trait SchemaRegistry: Send + Sync {
    /// Register `schema` under `subject` (idempotent) and return its id.
    fn register<'a>(
        &'a self,
        subject: &'a str,
        schema: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u32, RegistryError>> + Send + 'a>>;

    /// Schema definition (JSON) for an id.
    fn schema_by_id(
        &self,
        id: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, RegistryError>> + Send + '_>>;
}

/// `[schema_registry]` section of the service config.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Base URL, e.g. `http://localhost:8081`.
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Subject for record values of a topic (topic-name strategy).
pub fn value_subject(topic: &str) -> String {
    format!("{topic}-value")
}
