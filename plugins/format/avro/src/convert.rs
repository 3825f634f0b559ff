use apache_avro::types::Value;
use event_api::{EventError, FieldType, FieldValue, SchemaRecord};

// ═══════════════════════════════════════════════════════════════
//  Record → Avro
// ═══════════════════════════════════════════════════════════════

pub(crate) fn record_to_avro<T: SchemaRecord>(record: &T) -> Value {
    let fields = T::fields()
        .iter()
        .map(|f| (f.name.to_string(), field_to_avro(f.ty, (f.get)(record))))
        .collect();
    Value::Record(fields)
}

fn field_to_avro(ty: FieldType, value: FieldValue) -> Value {
    match (ty, value) {
        (FieldType::TimestampMillis, FieldValue::Long(v)) => Value::TimestampMillis(v),
        (_, FieldValue::Long(v)) => Value::Long(v),
        (_, FieldValue::String(s)) => Value::String(s),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Avro → Record
// ═══════════════════════════════════════════════════════════════

/// Fields are matched by name, never by position: a writer that
/// orders its fields differently still lands in the right slots.
pub(crate) fn avro_to_record<T: SchemaRecord>(value: Value) -> Result<T, EventError> {
    let fields = match value {
        Value::Record(fields) => fields,
        other => {
            return Err(EventError::format_err(format!(
                "avro: expected record {}, got {other:?}",
                T::NAME
            )));
        }
    };

    let mut record = T::default();
    for (name, value) in fields {
        let Some(pos) = T::position(&name) else {
            continue;
        };
        let value = avro_to_field(value)
            .map_err(|e| EventError::format_err(format!("avro: field '{name}': {e}")))?;
        record
            .put(pos, value)
            .map_err(|e| EventError::format_err(format!("avro: {e}")))?;
    }
    Ok(record)
}

fn avro_to_field(value: Value) -> Result<FieldValue, EventError> {
    match value {
        Value::String(s) | Value::Enum(_, s) => Ok(FieldValue::String(s)),
        Value::Int(i) => Ok(FieldValue::Long(i as i64)),
        Value::Long(l)
        | Value::TimestampMillis(l)
        | Value::LocalTimestampMillis(l) => Ok(FieldValue::Long(l)),
        Value::Union(_, inner) => avro_to_field(*inner),
        other => Err(EventError::format_err(format!("unsupported avro value {other:?}"))),
    }
}
