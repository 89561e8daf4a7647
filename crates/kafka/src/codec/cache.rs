use crate::error::RegistryError;
use crate::schema_registry::{value_subject, Schema, SchemaRegistry};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Memoizes schema ids and definitions so the registry is only consulted
/// once per `(subject, schema)` pair and once per id.
pub struct SchemaCache {
    registry: Arc<dyn SchemaRegistry>,
    auto_register: bool,
    ids: DashMap<(String, Schema), u32>,
    schemas: DashMap<u32, Schema>,
}

impl SchemaCache {
    /// A cache that registers unknown schemas on first use.
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            auto_register: true,
            ids: DashMap::new(),
            schemas: DashMap::new(),
        }
    }

    /// When disabled, unknown schemas are looked up instead of registered.
    pub fn with_auto_register(mut self, auto_register: bool) -> Self {
        self.auto_register = auto_register;
        self
    }

    /// Id of the value schema for `topic`.
    pub async fn id_for(&self, topic: &str, schema: &Schema) -> Result<u32, RegistryError> {
        let key = (value_subject(topic), schema.clone());
        let cached = self.ids.get(&key).map(|entry| *entry.value());
        if let Some(id) = cached {
            return Ok(id);
        }

        let id = if self.auto_register {
            self.registry.register(&key.0, schema).await?
        } else {
            self.registry.lookup(&key.0, schema).await?
        };
        debug!("Resolved {} schema for {} to id {id}", schema.kind, key.0);

        self.schemas.entry(id).or_insert_with(|| schema.clone());
        Ok(*self.ids.entry(key).or_insert(id).value())
    }

    pub async fn schema(&self, id: u32) -> Result<Schema, RegistryError> {
        let cached = self.schemas.get(&id).map(|entry| entry.value().clone());
        if let Some(schema) = cached {
            return Ok(schema);
        }
        let schema = self.registry.schema_by_id(id).await?;
        Ok(self.schemas.entry(id).or_insert(schema).value().clone())
    }
}
