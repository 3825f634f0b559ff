use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use apache_avro::Schema;
use event_api::{EventError, SchemaRecord, ValueCodec};
use schema_registry::{SchemaRegistry, value_subject};
use tokio::sync::RwLock;

use super::convert::{avro_to_record, record_to_avro};

/// First byte of every framed value.
pub const MAGIC_BYTE: u8 = 0;
/// Magic byte + big-endian u32 schema id.
pub const HEADER_LEN: usize = 5;

// ═══════════════════════════════════════════════════════════════
//  Wire framing
// ═══════════════════════════════════════════════════════════════

pub fn frame(schema_id: u32, datum: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + datum.len());
    buf.push(MAGIC_BYTE);
    buf.extend_from_slice(&schema_id.to_be_bytes());
    buf.extend_from_slice(datum);
    buf
}

/// Split a framed value into (schema id, avro datum).
pub fn unframe(data: &[u8]) -> Result<(u32, &[u8]), EventError> {
    if data.len() < HEADER_LEN {
        return Err(EventError::format_err(format!(
            "avro: frame too short ({} bytes)",
            data.len()
        )));
    }
    if data[0] != MAGIC_BYTE {
        return Err(EventError::format_err(format!("avro: unknown magic byte {:#04x}", data[0])));
    }
    let id = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);
    Ok((id, &data[HEADER_LEN..]))
}

// ═══════════════════════════════════════════════════════════════
//  AvroCodec
// ═══════════════════════════════════════════════════════════════

/// Registry-backed Avro codec for one record type.
///
/// Encode registers the record schema under `<topic>-value` and frames
/// the datum with the returned id. Decode fetches the writer schema by id
/// and resolves it against the record schema.
pub struct AvroCodec<T> {
    registry: Arc<dyn SchemaRegistry>,
    schema: Schema,
    schema_json: String,
    writers: RwLock<HashMap<u32, Arc<Schema>>>,
    _record: PhantomData<fn() -> T>,
}

impl<T: SchemaRecord> AvroCodec<T> {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Result<Self, EventError> {
        let schema_json = T::schema_json();
        let schema = Schema::parse_str(&schema_json)
            .map_err(|e| EventError::config(format!("avro: failed to parse {} schema: {e}", T::NAME)))?;
        Ok(Self {
            registry,
            schema,
            schema_json,
            writers: RwLock::new(HashMap::new()),
            _record: PhantomData,
        })
    }

    async fn writer_schema(&self, id: u32) -> Result<Arc<Schema>, EventError> {
        if let Some(schema) = self.writers.read().await.get(&id) {
            return Ok(schema.clone());
        }
        let text = self
            .registry
            .schema_by_id(id)
            .await
            .map_err(|e| e.into_event_error())?;
        let schema = Schema::parse_str(&text)
            .map_err(|e| EventError::format_err(format!("avro: writer schema {id}: {e}")))?;
        let schema = Arc::new(schema);
        self.writers.write().await.insert(id, schema.clone());
        tracing::debug!(schema_id = id, "cached writer schema");
        Ok(schema)
    }
}

impl<T: SchemaRecord> ValueCodec<T> for AvroCodec<T> {
    fn encode<'a>(
        &'a self,
        topic: &'a str,
        value: &'a T,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, EventError>> + Send + 'a>> {
        Box::pin(async move {
            let subject = value_subject(topic);
            let id = self
                .registry
                .register(&subject, &self.schema_json)
                .await
                .map_err(|e| e.into_event_error())?;
            let datum = apache_avro::to_avro_datum(&self.schema, record_to_avro(value))
                .map_err(|e| EventError::delivery(format!("avro encode: {e}")))?;
            Ok(frame(id, &datum))
        })
    }

    fn decode<'a>(
        &'a self,
        _topic: &'a str,
        data: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<T, EventError>> + Send + 'a>> {
        Box::pin(async move {
            let (id, mut datum) = unframe(data)?;
            let writer = self.writer_schema(id).await?;
            let value = apache_avro::from_avro_datum(&writer, &mut datum, Some(&self.schema))
                .map_err(|e| EventError::format_err(format!("avro decode: {e}")))?;
            avro_to_record(value)
        })
    }
}

#[cfg(test)]
mod tests {
    use apache_avro::types::Value;
    use event_api::{ErrorKind, UserEvent};
    use schema_registry::MemorySchemaRegistry;

    use super::*;

    fn codec() -> (Arc<MemorySchemaRegistry>, AvroCodec<UserEvent>) {
        let registry = Arc::new(MemorySchemaRegistry::new());
        let codec = AvroCodec::new(registry.clone() as Arc<dyn SchemaRegistry>).unwrap();
        (registry, codec)
    }

    #[tokio::test]
    async fn encoded_value_carries_registered_schema_id() {
        let (registry, codec) = codec();
        let event = UserEvent::new("u1", "n1", "e1", 1_700_000_000_000);

        let bytes = codec.encode("users", &event).await.unwrap();
        let (id, _) = unframe(&bytes).unwrap();
        assert_eq!(registry.versions("users-value").await, vec![id]);

        let decoded = codec.decode("users", &bytes).await.unwrap();
        assert_eq!(decoded, event);
    }

    #[tokio::test]
    async fn writer_with_other_field_order_decodes_by_name() {
        let (registry, codec) = codec();
        let writer_json = r#"{
            "type": "record", "name": "UserEvent", "namespace": "users.events",
            "fields": [
                {"name": "createdAt", "type": {"type": "long", "logicalType": "timestamp-millis"}},
                {"name": "userEmail", "type": "string"},
                {"name": "userName", "type": "string"},
                {"name": "userId", "type": "string"}
            ]
        }"#;
        let id = registry.register("users-value", writer_json).await.unwrap();
        let writer = Schema::parse_str(writer_json).unwrap();
        let value = Value::Record(vec![
            ("createdAt".into(), Value::TimestampMillis(7)),
            ("userEmail".into(), Value::String("e2".into())),
            ("userName".into(), Value::String("n2".into())),
            ("userId".into(), Value::String("u2".into())),
        ]);
        let datum = apache_avro::to_avro_datum(&writer, value).unwrap();

        let decoded = codec.decode("users", &frame(id, &datum)).await.unwrap();
        assert_eq!(decoded, UserEvent::new("u2", "n2", "e2", 7));
    }

    #[tokio::test]
    async fn malformed_frames_are_format_errors() {
        let (_, codec) = codec();
        for data in [&[0u8, 0, 0][..], &[1, 0, 0, 0, 1, 2][..], &[0, 0, 0, 0, 42, 2][..]] {
            let err = codec.decode("users", data).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{data:?}");
        }
    }

    #[tokio::test]
    async fn truncated_datum_is_a_format_error() {
        let (_, codec) = codec();
        let event = UserEvent::new("u1", "n1", "e1", 1);
        let bytes = codec.encode("users", &event).await.unwrap();
        let err = codec.decode("users", &bytes[..HEADER_LEN + 2]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}
