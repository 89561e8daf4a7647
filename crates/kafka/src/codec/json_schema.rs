//! JSON payloads described by a registered JSON Schema.
//!
//! Types without an explicit schema get one inferred once from the shape of
//! `T::default()`, so every value of a type registers the same schema.
//! Members that are null by default (`Option` fields) accept any value.
//! Validation covers `type`, `properties`, `required` and `items`, which is
//! what inferred schemas use.

use super::wire::{frame, unframe};
use super::{Codec, Payload, SchemaCache};
use crate::error::CodecError;
use crate::schema_registry::{Schema, SchemaKind};
use async_trait::async_trait;
use dashmap::DashMap;
use kafka_types::Format;
use serde_json::{json, Map, Value};
use std::any::TypeId;
use std::sync::Arc;

pub struct JsonSchemaCodec {
    cache: Arc<SchemaCache>,
    inferred: DashMap<TypeId, Arc<Schema>>,
}

impl JsonSchemaCodec {
    pub fn new(cache: Arc<SchemaCache>) -> Self {
        Self {
            cache,
            inferred: DashMap::new(),
        }
    }

    /// Writer schema of `T`, inferred at most once per type.
    fn writer_schema<T: Payload>(&self) -> Result<Arc<Schema>, CodecError> {
        let key = TypeId::of::<T>();
        if let Some(schema) = self.inferred.get(&key) {
            return Ok(schema.clone());
        }
        let shape = serde_json::to_value(T::default()).map_err(failure)?;
        let schema = Arc::new(Schema::new(
            SchemaKind::Json,
            infer_schema(&shape).to_string(),
        ));
        Ok(self.inferred.entry(key).or_insert(schema).clone())
    }
}

fn failure(message: impl std::fmt::Display) -> CodecError {
    CodecError::failure(Format::JsonSchema, message)
}

#[async_trait]
impl<T: Payload> Codec<T> for JsonSchemaCodec {
    fn format(&self) -> Format {
        Format::JsonSchema
    }

    async fn encode(&self, topic: &str, payload: &T) -> Result<Vec<u8>, CodecError> {
        let value = serde_json::to_value(payload).map_err(failure)?;
        let schema = match T::json_schema() {
            Some(schema) => {
                validate(&schema, &value, "$")?;
                Arc::new(Schema::new(SchemaKind::Json, schema.to_string()))
            }
            None => self.writer_schema::<T>()?,
        };
        let body = serde_json::to_vec(&value).map_err(failure)?;

        let id = self.cache.id_for(topic, &schema).await?;
        Ok(frame(id, &body))
    }

    async fn decode(&self, _topic: &str, bytes: &[u8], target: &mut T) -> Result<(), CodecError> {
        let (id, body) = unframe(Format::JsonSchema, bytes)?;
        let writer = self.cache.schema(id).await?;
        if writer.kind != SchemaKind::Json {
            return Err(failure(format!("schema {id} is {}, not JSON", writer.kind)));
        }
        let schema: Value = serde_json::from_str(&writer.definition).map_err(failure)?;
        let value: Value = serde_json::from_slice(body).map_err(failure)?;
        validate(&schema, &value, "$")?;
        *target = serde_json::from_value(value).map_err(failure)?;
        Ok(())
    }
}

/// Describe the shape of `value` as a JSON Schema.
///
/// Null carries no type information and becomes the empty schema, which
/// accepts any value.
pub fn infer_schema(value: &Value) -> Value {
    match value {
        Value::Null => json!({}),
        Value::Bool(_) => json!({"type": "boolean"}),
        Value::Number(n) if n.is_f64() => json!({"type": "number"}),
        Value::Number(_) => json!({"type": "integer"}),
        Value::String(_) => json!({"type": "string"}),
        Value::Array(items) => match items.first() {
            Some(first) => json!({"type": "array", "items": infer_schema(first)}),
            None => json!({"type": "array"}),
        },
        Value::Object(fields) => {
            let properties: Map<String, Value> = fields
                .iter()
                .map(|(name, field)| (name.clone(), infer_schema(field)))
                .collect();
            json!({"type": "object", "properties": properties})
        }
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "null" => value.is_null(),
        "boolean" => value.is_boolean(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "string" => value.is_string(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

/// Check `value` against the subset of JSON Schema produced by [`infer_schema`].
pub fn validate(schema: &Value, value: &Value, path: &str) -> Result<(), CodecError> {
    let matches_type = match schema.get("type") {
        Some(Value::String(expected)) => type_matches(expected, value),
        Some(Value::Array(options)) => options
            .iter()
            .filter_map(Value::as_str)
            .any(|expected| type_matches(expected, value)),
        _ => true,
    };
    if !matches_type {
        return Err(failure(format!(
            "{path}: expected type {}, got {value}",
            schema["type"]
        )));
    }

    if let (Some(properties), Value::Object(fields)) =
        (schema.get("properties").and_then(Value::as_object), value)
    {
        for (name, field_schema) in properties {
            if let Some(field) = fields.get(name) {
                validate(field_schema, field, &format!("{path}.{name}"))?;
            }
        }
    }
    if let (Some(required), Value::Object(fields)) =
        (schema.get("required").and_then(Value::as_array), value)
    {
        for name in required.iter().filter_map(Value::as_str) {
            if !fields.contains_key(name) {
                return Err(failure(format!("{path}: missing required property {name}")));
            }
        }
    }
    if let (Some(items), Value::Array(elements)) = (schema.get("items"), value) {
        for (index, element) in elements.iter().enumerate() {
            validate(items, element, &format!("{path}[{index}]"))?;
        }
    }
    Ok(())
}
