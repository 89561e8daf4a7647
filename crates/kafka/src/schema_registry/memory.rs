use super::{Schema, SchemaRegistry};
use crate::error::RegistryError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
struct Subjects {
    by_id: HashMap<u32, Schema>,
    by_subject: HashMap<String, Vec<(Schema, u32)>>,
    next_id: u32,
}

/// In-process registry with sequential ids, starting at 1.
///
/// Identical schemas get the same id across subjects, like the real registry.
#[derive(Default)]
pub struct MemorySchemaRegistry {
    subjects: Mutex<Subjects>,
    register_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `register` calls received.
    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    /// Number of `schema_by_id` calls received.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Schemas registered under `subject`, oldest first.
    pub async fn versions(&self, subject: &str) -> Vec<Schema> {
        let subjects = self.subjects.lock().await;
        subjects
            .by_subject
            .get(subject)
            .map(|versions| versions.iter().map(|(schema, _)| schema.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SchemaRegistry for MemorySchemaRegistry {
    async fn register(&self, subject: &str, schema: &Schema) -> Result<u32, RegistryError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let mut subjects = self.subjects.lock().await;

        let existing = subjects
            .by_id
            .iter()
            .find(|(_, known)| *known == schema)
            .map(|(id, _)| *id);
        let id = match existing {
            Some(id) => id,
            None => {
                subjects.next_id += 1;
                let id = subjects.next_id;
                subjects.by_id.insert(id, schema.clone());
                id
            }
        };

        let versions = subjects.by_subject.entry(subject.to_string()).or_default();
        if !versions.iter().any(|(_, known)| *known == id) {
            versions.push((schema.clone(), id));
        }
        Ok(id)
    }

    async fn lookup(&self, subject: &str, schema: &Schema) -> Result<u32, RegistryError> {
        let subjects = self.subjects.lock().await;
        subjects
            .by_subject
            .get(subject)
            .and_then(|versions| versions.iter().find(|(known, _)| known == schema))
            .map(|(_, id)| *id)
            .ok_or_else(|| RegistryError::SubjectNotFound(subject.to_string()))
    }

    async fn schema_by_id(&self, id: u32) -> Result<Schema, RegistryError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let subjects = self.subjects.lock().await;
        subjects
            .by_id
            .get(&id)
            .cloned()
            .ok_or(RegistryError::SchemaNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_registry::SchemaKind;

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = MemorySchemaRegistry::new();
        let schema = Schema::new(SchemaKind::Avro, r#""string""#);

        let first = registry.register("a-value", &schema).await.unwrap();
        let second = registry.register("a-value", &schema).await.unwrap();
        let other_subject = registry.register("b-value", &schema).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(first, second);
        assert_eq!(first, other_subject);
        assert_eq!(registry.versions("a-value").await.len(), 1);
        assert_eq!(registry.register_calls(), 3);
    }

    #[tokio::test]
    async fn test_new_schema_gets_new_id() {
        let registry = MemorySchemaRegistry::new();
        let v1 = Schema::new(SchemaKind::Avro, r#""string""#);
        let v2 = Schema::new(SchemaKind::Avro, r#""long""#);

        assert_eq!(registry.register("a-value", &v1).await.unwrap(), 1);
        assert_eq!(registry.register("a-value", &v2).await.unwrap(), 2);
        assert_eq!(registry.schema_by_id(2).await.unwrap(), v2);
        assert_eq!(registry.lookup("a-value", &v1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_entries() {
        let registry = MemorySchemaRegistry::new();
        let schema = Schema::new(SchemaKind::Json, "{}");
        assert!(matches!(
            registry.schema_by_id(9).await,
            Err(RegistryError::SchemaNotFound(9))
        ));
        assert!(matches!(
            registry.lookup("x-value", &schema).await,
            Err(RegistryError::SubjectNotFound(_))
        ));
    }
}
