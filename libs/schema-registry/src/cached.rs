use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::RwLock;

use crate::{RegistryError, SchemaRegistry};

/// Read-through cache in front of any registry.
///
/// Ids and schemas never change once assigned, so entries are never
/// evicted. Concurrent readers only take the read lock; a miss goes to
/// the inner registry without holding any lock.
pub struct CachedSchemaRegistry<R> {
    inner: R,
    ids: RwLock<HashMap<(String, String), u32>>,
    schemas: RwLock<HashMap<u32, String>>,
}

impl<R: SchemaRegistry> CachedSchemaRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            ids: RwLock::new(HashMap::new()),
            schemas: RwLock::new(HashMap::new()),
        }
    }
}

impl<R: SchemaRegistry> SchemaRegistry for CachedSchemaRegistry<R> {
    fn register<'a>(
        &'a self,
        subject: &'a str,
        schema: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u32, RegistryError>> + Send + 'a>> {
        Box::pin(async move {
            let key = (subject.to_string(), schema.to_string());
            if let Some(id) = self.ids.read().await.get(&key) {
                return Ok(*id);
            }
            let id = self.inner.register(subject, schema).await?;
            self.ids.write().await.insert(key, id);
            self.schemas.write().await.entry(id).or_insert_with(|| schema.to_string());
            Ok(id)
        })
    }

    fn schema_by_id(
        &self,
        id: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, RegistryError>> + Send + '_>> {
        Box::pin(async move {
            if let Some(schema) = self.schemas.read().await.get(&id) {
                return Ok(schema.clone());
            }
            let schema = self.inner.schema_by_id(id).await?;
            self.schemas.write().await.insert(id, schema.clone());
            Ok(schema)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::MemorySchemaRegistry;

    #[derive(Default)]
    struct Counting {
        inner: MemorySchemaRegistry,
        registers: Arc<AtomicUsize>,
        lookups: Arc<AtomicUsize>,
    }

    impl SchemaRegistry for Counting {
        fn register<'a>(
            &'a self,
            subject: &'a str,
            schema: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<u32, RegistryError>> + Send + 'a>> {
            self.registers.fetch_add(1, Ordering::SeqCst);
            self.inner.register(subject, schema)
        }

        fn schema_by_id(
            &self,
            id: u32,
        ) -> Pin<Box<dyn Future<Output = Result<String, RegistryError>> + Send + '_>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.schema_by_id(id)
        }
    }

    #[tokio::test]
    async fn repeated_calls_hit_inner_registry_once() {
        let counting = Counting::default();
        let registers = counting.registers.clone();
        let lookups = counting.lookups.clone();
        let cached = CachedSchemaRegistry::new(counting);

        let id = cached.register("users-value", r#""string""#).await.unwrap();
        assert_eq!(cached.register("users-value", r#""string""#).await.unwrap(), id);
        assert_eq!(registers.load(Ordering::SeqCst), 1);

        // registering populated the id → schema side as well
        assert_eq!(cached.schema_by_id(id).await.unwrap(), r#""string""#);
        assert_eq!(lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let counting = Counting::default();
        let lookups = counting.lookups.clone();
        let cached = CachedSchemaRegistry::new(counting);

        assert!(cached.schema_by_id(9).await.is_err());
        assert!(cached.schema_by_id(9).await.is_err());
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }
}
