use super::wire::{frame, unframe};
use super::{Codec, Payload, SchemaCache};
use crate::error::CodecError;
use crate::schema_registry::{Schema, SchemaKind};
use apache_avro::Schema as AvroSchema;
use async_trait::async_trait;
use dashmap::DashMap;
use kafka_types::Format;
use std::marker::PhantomData;
use std::sync::Arc;

fn failure(message: impl std::fmt::Display) -> CodecError {
    CodecError::failure(Format::Avro, message)
}

/// Avro binary datums framed with the id of the writer schema.
///
/// The payload type supplies its schema through [`Payload::avro_schema`].
/// Records written with a different registered schema are resolved against
/// it on decode.
pub struct AvroCodec<T> {
    cache: Arc<SchemaCache>,
    reader: Result<Arc<AvroSchema>, String>,
    writers: DashMap<u32, Arc<AvroSchema>>,
    _payload: PhantomData<fn() -> T>,
}

impl<T: Payload> AvroCodec<T> {
    pub fn new(cache: Arc<SchemaCache>) -> Self {
        let reader = match T::avro_schema() {
            Some(definition) => AvroSchema::parse_str(definition)
                .map(Arc::new)
                .map_err(|e| format!("invalid avro schema for {}: {e}", std::any::type_name::<T>())),
            None => Err(format!(
                "{} does not declare an avro schema",
                std::any::type_name::<T>()
            )),
        };
        Self {
            cache,
            reader,
            writers: DashMap::new(),
            _payload: PhantomData,
        }
    }

    fn reader(&self) -> Result<&Arc<AvroSchema>, CodecError> {
        self.reader.as_ref().map_err(failure)
    }

    async fn writer(&self, id: u32) -> Result<Arc<AvroSchema>, CodecError> {
        let cached = self.writers.get(&id).map(|entry| entry.value().clone());
        if let Some(schema) = cached {
            return Ok(schema);
        }
        let registered = self.cache.schema(id).await?;
        if registered.kind != SchemaKind::Avro {
            return Err(failure(format!(
                "schema {id} is {}, not AVRO",
                registered.kind
            )));
        }
        let parsed = Arc::new(AvroSchema::parse_str(&registered.definition).map_err(failure)?);
        Ok(self.writers.entry(id).or_insert(parsed).value().clone())
    }
}

#[async_trait]
impl<T: Payload> Codec<T> for AvroCodec<T> {
    fn format(&self) -> Format {
        Format::Avro
    }

    async fn encode(&self, topic: &str, payload: &T) -> Result<Vec<u8>, CodecError> {
        let reader = self.reader()?.clone();
        let value = apache_avro::to_value(payload)
            .and_then(|value| value.resolve(&reader))
            .map_err(failure)?;
        let body = apache_avro::to_avro_datum(&reader, value).map_err(failure)?;

        let schema = Schema::new(SchemaKind::Avro, reader.canonical_form());
        let id = self.cache.id_for(topic, &schema).await?;
        Ok(frame(id, &body))
    }

    async fn decode(&self, _topic: &str, bytes: &[u8], target: &mut T) -> Result<(), CodecError> {
        let reader = self.reader()?.clone();
        let (id, mut body) = unframe(Format::Avro, bytes)?;
        let writer = self.writer(id).await?;
        let value =
            apache_avro::from_avro_datum(&writer, &mut body, Some(&reader)).map_err(failure)?;
        *target = apache_avro::from_value::<T>(&value).map_err(failure)?;
        Ok(())
    }
}
