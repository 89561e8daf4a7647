use super::wire::{frame_with_indexes, read_message_indexes, unframe};
use super::{Codec, Payload, SchemaCache};
use crate::error::CodecError;
use crate::proto::{render_proto, ProtoAdapter, ProtoView, TypeKey};
use crate::schema_registry::{Schema, SchemaKind};
use async_trait::async_trait;
use dashmap::DashMap;
use kafka_types::Format;
use protobuf::reflect::MessageDescriptor;
use std::sync::Arc;
use tracing::debug;

fn failure(message: impl std::fmt::Display) -> CodecError {
    CodecError::failure(Format::Protobuf, message)
}

/// Protobuf messages framed with a schema id and message index path.
///
/// Payloads go through the [`ProtoAdapter`] in both directions, so native
/// messages and registered structural look-alikes share one wire encoding.
pub struct ProtobufCodec {
    cache: Arc<SchemaCache>,
    adapter: Arc<ProtoAdapter>,
    rendered: DashMap<MessageDescriptor, Schema>,
}

impl ProtobufCodec {
    pub fn new(cache: Arc<SchemaCache>, adapter: Arc<ProtoAdapter>) -> Self {
        Self {
            cache,
            adapter,
            rendered: DashMap::new(),
        }
    }

    /// Registry schema for the file declaring `descriptor`.
    fn schema_for(&self, descriptor: &MessageDescriptor) -> Schema {
        self.rendered
            .entry(descriptor.clone())
            .or_insert_with(|| {
                Schema::new(
                    SchemaKind::Protobuf,
                    render_proto(descriptor.file_descriptor_proto()),
                )
            })
            .value()
            .clone()
    }
}

/// Position of `descriptor` within its file: top-level index first, then the
/// index at each level of nesting.
pub fn message_indexes(descriptor: &MessageDescriptor) -> Vec<i32> {
    let mut indexes = Vec::new();
    let mut current = descriptor.clone();
    loop {
        match current.enclosing_message() {
            Some(parent) => {
                indexes.push(position(parent.nested_messages(), &current));
                current = parent;
            }
            None => {
                indexes.push(position(current.file_descriptor().messages(), &current));
                break;
            }
        }
    }
    indexes.reverse();
    indexes
}

fn position(
    mut siblings: impl Iterator<Item = MessageDescriptor>,
    descriptor: &MessageDescriptor,
) -> i32 {
    siblings
        .position(|sibling| sibling == *descriptor)
        .unwrap_or_default() as i32
}

#[async_trait]
impl<T: Payload> Codec<T> for ProtobufCodec {
    fn format(&self) -> Format {
        Format::Protobuf
    }

    async fn encode(&self, topic: &str, payload: &T) -> Result<Vec<u8>, CodecError> {
        let (schema, indexes, body) = {
            let message = self.adapter.adapt_for_encode(payload.proto_view())?;
            let descriptor = message.descriptor_dyn();
            let body = message.write_to_bytes_dyn().map_err(failure)?;
            (
                self.schema_for(&descriptor),
                message_indexes(&descriptor),
                body,
            )
        };
        let id = self.cache.id_for(topic, &schema).await?;
        frame_with_indexes(id, &indexes, &body)
    }

    async fn decode(&self, topic: &str, bytes: &[u8], target: &mut T) -> Result<(), CodecError> {
        let (id, rest) = unframe(Format::Protobuf, bytes)?;
        let (indexes, body) = read_message_indexes(rest)?;
        let writer = self.cache.schema(id).await?;
        if writer.kind != SchemaKind::Protobuf {
            return Err(failure(format!(
                "schema {id} is {}, not PROTOBUF",
                writer.kind
            )));
        }

        let mut carrier = self
            .adapter
            .create_instance(TypeKey::of::<T>(), target.proto_view())?;
        let expected = message_indexes(&carrier.descriptor_dyn());
        if expected != indexes {
            debug!(
                "Record on {topic} written at message path {indexes:?}, decoding as {} at {expected:?}",
                carrier.descriptor_dyn().full_name()
            );
        }
        carrier.merge_from_bytes_dyn(body).map_err(failure)?;
        self.adapter
            .adapt_for_decode(ProtoView::Native(carrier.as_ref()), target.proto_view_mut())?;
        Ok(())
    }
}
