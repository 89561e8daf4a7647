//! Reconciles payloads with the protobuf messages the codec can encode.
//!
//! Native messages pass through untouched. Structural look-alikes are copied
//! field by field into a fresh instance of a compatible message type, found in
//! this order:
//!
//! 1. a type registered with [`ProtoAdapter::register_type`] or
//!    [`ProtoAdapter::register_descriptor`],
//! 2. a type detected earlier,
//! 3. heuristic detection, when enabled with
//!    [`ProtoAdapter::with_heuristic_detection`].
//!
//! Structural classification is duck typing. A type exposing at least three of
//! the five [`SurfaceMember`]s is treated as a protobuf look-alike, and the
//! heuristic accepts a type when more than half of its fields are tagged.
//! Neither check proves compatibility: an unrelated type that happens to
//! expose three matching members is misclassified, and only fields whose name
//! and type both match are copied. Register types explicitly where possible.

use super::{ProtoView, ProtoViewMut, StructuralMessage, TypeKey, PROTOBUF_SURFACE};
use crate::error::AdapterError;
use dashmap::DashMap;
use protobuf::reflect::{MessageDescriptor, RuntimeFieldType};
use protobuf::MessageDyn;
use std::ops::Deref;
use tracing::{debug, warn};

/// Minimum number of surface members for structural adaptation.
const MIN_SURFACE_MEMBERS: usize = 3;

/// A message ready for the protobuf codec.
pub enum Adapted<'a> {
    /// The payload itself, already native.
    Borrowed(&'a dyn MessageDyn),
    /// A copy built from a structural payload.
    Owned(Box<dyn MessageDyn>),
}

impl Deref for Adapted<'_> {
    type Target = dyn MessageDyn;

    fn deref(&self) -> &Self::Target {
        match self {
            Adapted::Borrowed(message) => *message,
            Adapted::Owned(message) => &**message,
        }
    }
}

#[derive(Default)]
pub struct ProtoAdapter {
    registered: DashMap<TypeKey, MessageDescriptor>,
    detected: DashMap<TypeKey, MessageDescriptor>,
    heuristic_detection: bool,
}

impl ProtoAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the best-effort detection fallback.
    pub fn with_heuristic_detection(mut self, enabled: bool) -> Self {
        self.heuristic_detection = enabled;
        self
    }

    /// Map `key` to the message type of `example`.
    pub fn register_type(&self, key: TypeKey, example: &dyn MessageDyn) {
        self.register_descriptor(key, example.descriptor_dyn());
    }

    pub fn register_descriptor(&self, key: TypeKey, descriptor: MessageDescriptor) {
        debug!("Registered protobuf type {} for {key}", descriptor.full_name());
        self.registered.insert(key, descriptor);
    }

    pub fn is_registered(&self, key: &TypeKey) -> bool {
        self.registered.contains_key(key)
    }

    /// Registered or previously detected message type for `key`.
    pub fn descriptor_for(&self, key: &TypeKey) -> Option<MessageDescriptor> {
        self.registered
            .get(key)
            .or_else(|| self.detected.get(key))
            .map(|entry| entry.value().clone())
    }

    pub fn adapt_for_encode<'a>(&self, view: ProtoView<'a>) -> Result<Adapted<'a>, AdapterError> {
        match view {
            ProtoView::Native(message) => Ok(Adapted::Borrowed(message)),
            ProtoView::Indirect(inner) => self.adapt_for_encode(*inner),
            ProtoView::Structural(source) => {
                if surface_matches(source) < MIN_SURFACE_MEMBERS {
                    return Err(AdapterError::NotAdaptable(source.type_name().to_string()));
                }
                let descriptor = self
                    .compatible_descriptor(source)
                    .ok_or_else(|| AdapterError::NotAdaptable(source.type_name().to_string()))?;
                let mut target = descriptor.new_instance();
                copy_into_native(source, target.as_mut());
                Ok(Adapted::Owned(target))
            }
            ProtoView::Opaque(name) => Err(AdapterError::NotAdaptable(name.to_string())),
        }
    }

    /// Move the contents of a decoded native message into `target`.
    ///
    /// Native targets are cleared and re-decoded from the source's wire
    /// encoding; structural targets receive a field copy.
    pub fn adapt_for_decode(
        &self,
        source: ProtoView<'_>,
        target: ProtoViewMut<'_>,
    ) -> Result<(), AdapterError> {
        let source = native_source(source)?;
        match target {
            ProtoViewMut::Native(target) => {
                let bytes = source
                    .write_to_bytes_dyn()
                    .map_err(|e| AdapterError::Failure(e.to_string()))?;
                clear(target);
                target
                    .merge_from_bytes_dyn(&bytes)
                    .map_err(|e| AdapterError::Failure(e.to_string()))
            }
            ProtoViewMut::Indirect(inner) => {
                self.adapt_for_decode(ProtoView::Native(source), *inner)
            }
            ProtoViewMut::Structural(target) => {
                copy_from_native(source, target);
                Ok(())
            }
            ProtoViewMut::Opaque(name) => Err(AdapterError::NotWritableTarget(name.to_string())),
        }
    }

    /// Build an empty carrier message to decode into for payloads of type `key`.
    ///
    /// `sample` is a view of a default payload; it supplies the descriptor of
    /// native payloads and the shape of structural ones.
    pub fn create_instance(
        &self,
        key: TypeKey,
        sample: ProtoView<'_>,
    ) -> Result<Box<dyn MessageDyn>, AdapterError> {
        if let Some(descriptor) = self.descriptor_for(&key) {
            return Ok(descriptor.new_instance());
        }
        let descriptor = match unwrap_indirect(sample) {
            ProtoView::Native(message) => Some(self.remember(key, message.descriptor_dyn())),
            ProtoView::Structural(source) => self.detect(key, source),
            _ => None,
        };
        descriptor
            .map(|descriptor| descriptor.new_instance())
            .ok_or_else(|| AdapterError::NoRegisteredOrDetectableType(key.name().to_string()))
    }

    fn compatible_descriptor(&self, source: &dyn StructuralMessage) -> Option<MessageDescriptor> {
        let key = source.type_key();
        self.descriptor_for(&key).or_else(|| self.detect(key, source))
    }

    /// Heuristic fallback: a type with a majority of tagged fields that names
    /// its own descriptor is provisionally accepted.
    fn detect(&self, key: TypeKey, source: &dyn StructuralMessage) -> Option<MessageDescriptor> {
        if !self.heuristic_detection {
            return None;
        }
        let fields = source.fields();
        let tagged = fields.iter().filter(|field| field.tagged).count();
        if fields.is_empty() || tagged * 2 <= fields.len() {
            return None;
        }
        let descriptor = source.descriptor()?;
        warn!(
            "Heuristically treating {} as protobuf message {}; register it explicitly to avoid misclassification",
            key,
            descriptor.full_name()
        );
        Some(self.remember(key, descriptor))
    }

    /// Load-or-store into the detection cache. Concurrent detections of the
    /// same type all observe the first stored descriptor.
    fn remember(&self, key: TypeKey, descriptor: MessageDescriptor) -> MessageDescriptor {
        self.detected.entry(key).or_insert(descriptor).value().clone()
    }
}

fn surface_matches(source: &dyn StructuralMessage) -> usize {
    let surface = source.surface();
    PROTOBUF_SURFACE
        .iter()
        .filter(|member| surface.contains(member))
        .count()
}

fn unwrap_indirect(view: ProtoView<'_>) -> ProtoView<'_> {
    match view {
        ProtoView::Indirect(inner) => unwrap_indirect(*inner),
        other => other,
    }
}

fn native_source(view: ProtoView<'_>) -> Result<&dyn MessageDyn, AdapterError> {
    match unwrap_indirect(view) {
        ProtoView::Native(message) => Ok(message),
        _ => Err(AdapterError::NotCompatibleSource),
    }
}

fn clear(message: &mut dyn MessageDyn) {
    let descriptor = message.descriptor_dyn();
    for field in descriptor.fields() {
        field.clear_field(message);
    }
    message.mut_unknown_fields_dyn().clear();
}

/// Copy singular fields with identical name and type. Returns the number copied.
fn copy_into_native(source: &dyn StructuralMessage, target: &mut dyn MessageDyn) -> usize {
    let descriptor = target.descriptor_dyn();
    let mut copied = 0;
    for field in source.fields() {
        let Some(target_field) = descriptor.field_by_name(&field.name) else {
            continue;
        };
        match target_field.runtime_field_type() {
            RuntimeFieldType::Singular(expected) if expected == field.value.get_type() => {
                target_field.set_singular_field(target, field.value);
                copied += 1;
            }
            _ => {}
        }
    }
    copied
}

fn copy_from_native(source: &dyn MessageDyn, target: &mut dyn StructuralMessage) -> usize {
    let mut copied = 0;
    for field in source.descriptor_dyn().fields() {
        if !matches!(field.runtime_field_type(), RuntimeFieldType::Singular(_)) {
            continue;
        }
        let value = field.get_singular_field_or_default(source).to_box();
        if target.set_field(field.name(), value) {
            copied += 1;
        }
    }
    copied
}
