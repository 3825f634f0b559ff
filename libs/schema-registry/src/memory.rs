use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::RwLock;

use crate::{RegistryError, SchemaRegistry};

#[derive(Default)]
struct Inner {
    /// id - 1 → schema.
    schemas: Vec<String>,
    ids: HashMap<String, u32>,
    /// subject → ids, in registration order (versions).
    subjects: HashMap<String, Vec<u32>>,
}

/// In-process registry for local runs without a registry service.
///
/// Identical schema text gets the same id regardless of subject,
/// the same way a Confluent registry deduplicates.
#[derive(Default)]
pub struct MemorySchemaRegistry {
    inner: RwLock<Inner>,
}

impl MemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids registered under `subject`, oldest first.
    pub async fn versions(&self, subject: &str) -> Vec<u32> {
        self.inner.read().await.subjects.get(subject).cloned().unwrap_or_default()
    }
}

impl SchemaRegistry for MemorySchemaRegistry {
    fn register<'a>(
        &'a self,
        subject: &'a str,
        schema: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u32, RegistryError>> + Send + 'a>> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            let id = match inner.ids.get(schema) {
                Some(id) => *id,
                None => {
                    inner.schemas.push(schema.to_string());
                    let id = inner.schemas.len() as u32;
                    inner.ids.insert(schema.to_string(), id);
                    id
                }
            };
            let versions = inner.subjects.entry(subject.to_string()).or_default();
            if !versions.contains(&id) {
                versions.push(id);
            }
            Ok(id)
        })
    }

    fn schema_by_id(
        &self,
        id: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, RegistryError>> + Send + '_>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            id.checked_sub(1)
                .and_then(|idx| inner.schemas.get(idx as usize))
                .cloned()
                .ok_or(RegistryError::NotFound(id))
        })
    }
}
