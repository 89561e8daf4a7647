//! Format dispatch for payload encoding.
//!
//! Each [`Format`] is served by one [`Codec`]. Plain JSON is encoded locally;
//! JSON Schema, Avro and Protobuf frame their output with a schema id from
//! the registry and register writer schemas on first use. Codec errors are
//! returned as-is and never retried here.

pub mod avro;
pub mod cache;
pub mod json;
pub mod json_schema;
pub mod protobuf;
pub mod wire;

pub use self::avro::AvroCodec;
pub use self::cache::SchemaCache;
pub use self::json::JsonCodec;
pub use self::json_schema::JsonSchemaCodec;
pub use self::protobuf::ProtobufCodec;

use crate::error::CodecError;
use crate::proto::{ProtoAdapter, ProtoView, ProtoViewMut};
use async_trait::async_trait;
use kafka_types::Format;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// An application payload that can travel in an envelope.
///
/// The provided methods opt a type into the schema-aware formats.
pub trait Payload:
    Serialize + DeserializeOwned + Default + PartialEq + Send + Sync + 'static
{
    /// Avro schema (JSON text) of the type.
    fn avro_schema() -> Option<&'static str> {
        None
    }

    /// JSON Schema of the type. Inferred from `Self::default()` when absent.
    fn json_schema() -> Option<serde_json::Value> {
        None
    }

    fn proto_view(&self) -> ProtoView<'_> {
        ProtoView::Opaque(std::any::type_name::<Self>())
    }

    fn proto_view_mut(&mut self) -> ProtoViewMut<'_> {
        ProtoViewMut::Opaque(std::any::type_name::<Self>())
    }
}

impl Payload for serde_json::Value {}

#[async_trait]
pub trait Codec<T: Payload>: Send + Sync {
    fn format(&self) -> Format;

    async fn encode(&self, topic: &str, payload: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode `bytes` into `target`, overwriting its contents.
    async fn decode(&self, topic: &str, bytes: &[u8], target: &mut T) -> Result<(), CodecError>;
}

/// Codecs bound per format for one payload type.
pub struct CodecTable<T: Payload> {
    codecs: HashMap<Format, Arc<dyn Codec<T>>>,
}

impl<T: Payload> CodecTable<T> {
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// All four formats, sharing one schema cache and protobuf adapter.
    pub fn standard(cache: Arc<SchemaCache>, adapter: Arc<ProtoAdapter>) -> Self {
        Self::empty()
            .bind(JsonCodec)
            .bind(JsonSchemaCodec::new(cache.clone()))
            .bind(AvroCodec::<T>::new(cache.clone()))
            .bind(ProtobufCodec::new(cache, adapter))
    }

    /// Bind `codec` to its format, replacing any previous binding.
    pub fn bind(mut self, codec: impl Codec<T> + 'static) -> Self {
        self.codecs.insert(codec.format(), Arc::new(codec));
        self
    }

    pub fn is_bound(&self, format: Format) -> bool {
        self.codecs.contains_key(&format)
    }

    fn codec(&self, format: Format) -> Result<&Arc<dyn Codec<T>>, CodecError> {
        self.codecs.get(&format).ok_or(CodecError::Unbound(format))
    }

    pub async fn encode(
        &self,
        format: Format,
        topic: &str,
        payload: &T,
    ) -> Result<Vec<u8>, CodecError> {
        self.codec(format)?.encode(topic, payload).await
    }

    pub async fn decode_into(
        &self,
        format: Format,
        topic: &str,
        bytes: &[u8],
        target: &mut T,
    ) -> Result<(), CodecError> {
        self.codec(format)?.decode(topic, bytes, target).await
    }

    pub async fn decode(
        &self,
        format: Format,
        topic: &str,
        bytes: &[u8],
    ) -> Result<T, CodecError> {
        let mut target = T::default();
        self.decode_into(format, topic, bytes, &mut target).await?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_registry::MemorySchemaRegistry;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sensor: String,
        value: f64,
    }

    impl Payload for Reading {}

    #[tokio::test]
    async fn test_unbound_format() {
        let table = CodecTable::<Reading>::empty().bind(JsonCodec);
        assert!(table.is_bound(Format::Json));
        assert!(!table.is_bound(Format::Avro));

        let result = table.encode(Format::Avro, "t", &Reading::default()).await;
        assert!(matches!(result, Err(CodecError::Unbound(Format::Avro))));
        let result = table.decode(Format::Protobuf, "t", b"{}").await;
        assert!(matches!(result, Err(CodecError::Unbound(Format::Protobuf))));
    }

    #[tokio::test]
    async fn test_standard_table_binds_every_format() {
        let cache = Arc::new(SchemaCache::new(Arc::new(MemorySchemaRegistry::new())));
        let table = CodecTable::<Reading>::standard(cache, Arc::new(ProtoAdapter::new()));
        for format in Format::ALL {
            assert!(table.is_bound(format), "{format} not bound");
        }
    }

    #[tokio::test]
    async fn test_json_value_payload() {
        let table = CodecTable::<serde_json::Value>::empty().bind(JsonCodec);
        let value = json!({"field1": "x", "field2": 1});
        let bytes = table.encode(Format::Json, "t", &value).await.unwrap();
        assert_eq!(table.decode(Format::Json, "t", &bytes).await.unwrap(), value);
    }
}
