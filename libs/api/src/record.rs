use crate::EventError;

// ════════════════════════════════════════════════════════════════
//  Field table
// ════════════════════════════════════════════════════════════════

/// Avro type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Long,
    /// `long` with logical type `timestamp-millis`.
    TimestampMillis,
}

impl FieldType {
    /// Avro schema fragment for this type.
    pub fn avro_type(&self) -> serde_json::Value {
        match self {
            FieldType::String => serde_json::json!("string"),
            FieldType::Long => serde_json::json!("long"),
            FieldType::TimestampMillis => {
                serde_json::json!({ "type": "long", "logicalType": "timestamp-millis" })
            }
        }
    }
}

/// Value of a single field, as read or written by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    String(String),
    Long(i64),
}

impl FieldValue {
    pub fn into_string(self, field: &str) -> Result<String, EventError> {
        match self {
            FieldValue::String(s) => Ok(s),
            other => Err(EventError::invalid_argument(format!(
                "field '{field}' expects a string, got {other:?}"
            ))),
        }
    }

    pub fn into_long(self, field: &str) -> Result<i64, EventError> {
        match self {
            FieldValue::Long(v) => Ok(v),
            other => Err(EventError::invalid_argument(format!(
                "field '{field}' expects a long, got {other:?}"
            ))),
        }
    }
}

/// One entry of a record's ordered field table.
///
/// Position in the table is the position in the registered schema.
pub struct FieldDescriptor<T: 'static> {
    pub name: &'static str,
    pub ty: FieldType,
    pub get: fn(&T) -> FieldValue,
    pub set: fn(&mut T, FieldValue) -> Result<(), EventError>,
}

/// A record type with a fixed, ordered field list.
///
/// The Avro schema is generated from `fields()`, so positional access and
/// the registered schema always agree on field order.
pub trait SchemaRecord: Default + Send + Sync + Sized + 'static {
    /// Avro record name.
    const NAME: &'static str;
    /// Avro namespace.
    const NAMESPACE: &'static str;

    fn fields() -> &'static [FieldDescriptor<Self>];

    fn field(pos: usize) -> Result<&'static FieldDescriptor<Self>, EventError> {
        let fields = Self::fields();
        fields.get(pos).ok_or_else(|| {
            EventError::out_of_range(format!(
                "{}: field position {pos} out of range 0..{}",
                Self::NAME,
                fields.len()
            ))
        })
    }

    /// Position of a field by name.
    fn position(name: &str) -> Option<usize> {
        Self::fields().iter().position(|f| f.name == name)
    }

    fn get(&self, pos: usize) -> Result<FieldValue, EventError> {
        let field = Self::field(pos)?;
        Ok((field.get)(self))
    }

    fn put(&mut self, pos: usize, value: FieldValue) -> Result<(), EventError> {
        let field = Self::field(pos)?;
        (field.set)(self, value)
    }

    /// Avro schema (JSON) generated from the field table.
    fn schema_json() -> String {
        let fields: Vec<serde_json::Value> = Self::fields()
            .iter()
            .map(|f| serde_json::json!({ "name": f.name, "type": f.ty.avro_type() }))
            .collect();
        serde_json::json!({
            "type": "record",
            "name": Self::NAME,
            "namespace": Self::NAMESPACE,
            "fields": fields,
        })
        .to_string()
    }
}

// ════════════════════════════════════════════════════════════════
//  UserEvent
// ════════════════════════════════════════════════════════════════

/// The event produced and consumed by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserEvent {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    /// Unix epoch millis.
    pub created_at: i64,
}

impl UserEvent {
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        user_email: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            user_email: user_email.into(),
            created_at,
        }
    }
}

static USER_EVENT_FIELDS: [FieldDescriptor<UserEvent>; 4] = [
    FieldDescriptor {
        name: "userId",
        ty: FieldType::String,
        get: |e| FieldValue::String(e.user_id.clone()),
        set: |e, v| {
            e.user_id = v.into_string("userId")?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "userName",
        ty: FieldType::String,
        get: |e| FieldValue::String(e.user_name.clone()),
        set: |e, v| {
            e.user_name = v.into_string("userName")?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "userEmail",
        ty: FieldType::String,
        get: |e| FieldValue::String(e.user_email.clone()),
        set: |e, v| {
            e.user_email = v.into_string("userEmail")?;
            Ok(())
        },
    },
    FieldDescriptor {
        name: "createdAt",
        ty: FieldType::TimestampMillis,
        get: |e| FieldValue::Long(e.created_at),
        set: |e, v| {
            e.created_at = v.into_long("createdAt")?;
            Ok(())
        },
    },
];

impl SchemaRecord for UserEvent {
    const NAME: &'static str = "UserEvent";
    const NAMESPACE: &'static str = "users.events";

    fn fields() -> &'static [FieldDescriptor<Self>] {
        &USER_EVENT_FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn sample() -> UserEvent {
        UserEvent::new("u1", "n1", "e1", 1_700_000_000_000)
    }

    #[test]
    fn positions_read_back_fields_in_schema_order() {
        let event = sample();
        assert_eq!(event.get(0).unwrap(), FieldValue::String("u1".into()));
        assert_eq!(event.get(1).unwrap(), FieldValue::String("n1".into()));
        assert_eq!(event.get(2).unwrap(), FieldValue::String("e1".into()));
        assert_eq!(event.get(3).unwrap(), FieldValue::Long(1_700_000_000_000));
    }

    #[test]
    fn position_past_the_table_is_out_of_range() {
        let mut event = sample();
        let err = event.get(4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        let err = event.get(usize::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        let err = event.put(4, FieldValue::Long(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert_eq!(event, sample());
    }

    #[test]
    fn put_writes_by_position_and_checks_type() {
        let mut event = UserEvent::default();
        event.put(0, FieldValue::String("u2".into())).unwrap();
        event.put(3, FieldValue::Long(42)).unwrap();
        assert_eq!(event.user_id, "u2");
        assert_eq!(event.created_at, 42);

        let err = event.put(3, FieldValue::String("nope".into())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(event.created_at, 42);
    }

    #[test]
    fn schema_is_generated_from_field_table() {
        let schema: serde_json::Value = serde_json::from_str(&UserEvent::schema_json()).unwrap();
        assert_eq!(schema["name"], "UserEvent");
        let names: Vec<&str> = schema["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["userId", "userName", "userEmail", "createdAt"]);
        assert_eq!(schema["fields"][3]["type"]["logicalType"], "timestamp-millis");
        assert_eq!(UserEvent::position("userEmail"), Some(2));
        assert_eq!(UserEvent::position("missing"), None);
    }
}
