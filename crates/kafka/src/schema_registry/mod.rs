//! Confluent-compatible schema registry access.
//!
//! Codecs register writer schemas under `{topic}-value` and fetch reader-side
//! schemas by id. [`HttpSchemaRegistry`] talks to a real registry,
//! [`MemorySchemaRegistry`] keeps everything in-process.

pub mod http;
pub mod memory;

pub use http::{HttpRegistryConfig, HttpSchemaRegistry};
pub use memory::MemorySchemaRegistry;

use crate::error::RegistryError;
use async_trait::async_trait;
use std::fmt;

/// Schema languages understood by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Avro,
    Json,
    Protobuf,
}

impl SchemaKind {
    /// The registry's `schemaType` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Avro => "AVRO",
            SchemaKind::Json => "JSON",
            SchemaKind::Protobuf => "PROTOBUF",
        }
    }

    /// Parse a `schemaType` value. The registry omits it for Avro.
    pub fn from_registry(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_uppercase).as_deref() {
            Some("JSON") => SchemaKind::Json,
            Some("PROTOBUF") => SchemaKind::Protobuf,
            _ => SchemaKind::Avro,
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    pub kind: SchemaKind,
    pub definition: String,
}

impl Schema {
    pub fn new(kind: SchemaKind, definition: impl Into<String>) -> Self {
        Self {
            kind,
            definition: definition.into(),
        }
    }
}

#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Register `schema` under `subject`, returning its global id.
    /// Registering an already known schema returns the existing id.
    async fn register(&self, subject: &str, schema: &Schema) -> Result<u32, RegistryError>;

    /// Id of `schema` under `subject`, without registering it.
    async fn lookup(&self, subject: &str, schema: &Schema) -> Result<u32, RegistryError>;

    async fn schema_by_id(&self, id: u32) -> Result<Schema, RegistryError>;
}

/// Subject name for record values published to `topic`.
pub fn value_subject(topic: &str) -> String {
    format!("{topic}-value")
}

/// Stand-in used when no registry URL is configured.
///
/// Every call fails with [`RegistryError::NotConfigured`], so schema-less
/// formats keep working while schema-aware ones report a clear error.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredSchemaRegistry;

#[async_trait]
impl SchemaRegistry for UnconfiguredSchemaRegistry {
    async fn register(&self, _subject: &str, _schema: &Schema) -> Result<u32, RegistryError> {
        Err(RegistryError::NotConfigured)
    }

    async fn lookup(&self, _subject: &str, _schema: &Schema) -> Result<u32, RegistryError> {
        Err(RegistryError::NotConfigured)
    }

    async fn schema_by_id(&self, _id: u32) -> Result<Schema, RegistryError> {
        Err(RegistryError::NotConfigured)
    }
}
