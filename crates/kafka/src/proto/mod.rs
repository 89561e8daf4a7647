//! Protobuf message representations and the adapter reconciling them.
//!
//! Payloads expose themselves to the protobuf codec through a [`ProtoView`]:
//!
//! - `Native`: a `protobuf` crate message, encoded as-is.
//! - `Indirect`: a handle (box, arc) around another view.
//! - `Structural`: a plain struct that mirrors a message field by field and
//!   describes itself through [`StructuralMessage`]. The [`adapter`] copies it
//!   into a native message of a registered or detected type.
//! - `Opaque`: anything else. Never adaptable.

pub mod adapter;
pub mod schema;

pub use adapter::{Adapted, ProtoAdapter};
pub use schema::{render_proto, ProtoSchema};

use protobuf::reflect::{MessageDescriptor, ReflectValueBox};
use protobuf::MessageDyn;
use std::any::TypeId;
use std::fmt;

/// Identity of a Rust type, used as a registry key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Members a protobuf message type is expected to expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMember {
    /// Type marker identifying the value as a protobuf message
    Marker,
    /// Reset to the default instance
    Reset,
    /// Access to the message descriptor
    Descriptor,
    /// Field-level reflection
    Reflect,
    /// Human-readable rendering
    Render,
}

/// The full surface of a protobuf message type.
pub const PROTOBUF_SURFACE: &[SurfaceMember] = &[
    SurfaceMember::Marker,
    SurfaceMember::Reset,
    SurfaceMember::Descriptor,
    SurfaceMember::Reflect,
    SurfaceMember::Render,
];

/// A field exposed by a [`StructuralMessage`].
#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub value: ReflectValueBox,
    /// Whether the field carries a protobuf field tag (e.g. generated code).
    pub tagged: bool,
}

impl StructField {
    pub fn tagged(name: impl Into<String>, value: impl Into<ReflectValueBox>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            tagged: true,
        }
    }

    pub fn untagged(name: impl Into<String>, value: impl Into<ReflectValueBox>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            tagged: false,
        }
    }
}

/// A struct that looks like a protobuf message without being one.
///
/// Field copies match by exact name and require identical value types. No
/// renaming or numeric widening takes place.
pub trait StructuralMessage: Send + Sync + 'static {
    /// Which message members this type provides.
    fn surface(&self) -> &'static [SurfaceMember];

    /// Current values of all singular fields.
    fn fields(&self) -> Vec<StructField>;

    /// Assign a field. Returns `false` when the name is unknown or the value
    /// has the wrong type.
    fn set_field(&mut self, name: &str, value: ReflectValueBox) -> bool;

    /// Descriptor this type claims to mirror, if it knows one.
    fn descriptor(&self) -> Option<MessageDescriptor> {
        None
    }

    fn type_key(&self) -> TypeKey {
        TypeKey::of::<Self>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Read-only protobuf view of a payload.
pub enum ProtoView<'a> {
    Native(&'a dyn MessageDyn),
    Indirect(Box<ProtoView<'a>>),
    Structural(&'a dyn StructuralMessage),
    Opaque(&'static str),
}

impl<'a> ProtoView<'a> {
    pub fn type_name(&self) -> String {
        match self {
            ProtoView::Native(message) => message.descriptor_dyn().full_name().to_string(),
            ProtoView::Indirect(inner) => inner.type_name(),
            ProtoView::Structural(message) => message.type_name().to_string(),
            ProtoView::Opaque(name) => (*name).to_string(),
        }
    }
}

/// Writable protobuf view of a decode target.
pub enum ProtoViewMut<'a> {
    Native(&'a mut dyn MessageDyn),
    Indirect(Box<ProtoViewMut<'a>>),
    Structural(&'a mut dyn StructuralMessage),
    Opaque(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_key_identity() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<u32>());
        assert!(TypeKey::of::<String>().name().contains("String"));
    }

    #[test]
    fn test_opaque_view_name() {
        let view = ProtoView::Opaque("my::Type");
        assert_eq!(view.type_name(), "my::Type");
        let view = ProtoView::Indirect(Box::new(ProtoView::Opaque("inner")));
        assert_eq!(view.type_name(), "inner");
    }
}
