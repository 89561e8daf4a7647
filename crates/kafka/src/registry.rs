//! At most one producer or consumer per payload type and topic.

use crate::error::{Error, Result};
use crate::proto::TypeKey;
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub type_key: TypeKey,
    pub topic: String,
}

impl InstanceKey {
    pub fn of<T: 'static>(topic: &str) -> Self {
        Self {
            type_key: TypeKey::of::<T>(),
            topic: topic.to_string(),
        }
    }
}

/// Lazily built instances keyed by `(instance type, topic)`.
///
/// Entries are never evicted. When callers race to create the same key, the
/// factory may run more than once but only the first stored instance is ever
/// returned; the others are dropped.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: DashMap<InstanceKey, Arc<dyn Any + Send + Sync>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<I: Send + Sync + 'static>(&self, topic: &str) -> Result<Option<Arc<I>>> {
        let existing = self
            .instances
            .get(&InstanceKey::of::<I>(topic))
            .map(|entry| entry.value().clone());
        existing.map(|instance| downcast(topic, instance)).transpose()
    }

    /// Return the instance for `topic`, building it with `factory` on first use.
    ///
    /// The factory runs without any registry lock held, so slow construction
    /// for one key never blocks other keys.
    pub fn get_or_create<I, F>(&self, topic: &str, factory: F) -> Result<Arc<I>>
    where
        I: Send + Sync + 'static,
        F: FnOnce() -> Result<I>,
    {
        if let Some(instance) = self.get::<I>(topic)? {
            return Ok(instance);
        }

        let built: Arc<dyn Any + Send + Sync> = Arc::new(factory()?);
        let stored = self
            .instances
            .entry(InstanceKey::of::<I>(topic))
            .or_insert_with(|| {
                debug!("Created {} for topic {topic}", std::any::type_name::<I>());
                built
            })
            .value()
            .clone();
        downcast(topic, stored)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn downcast<I: Send + Sync + 'static>(
    topic: &str,
    instance: Arc<dyn Any + Send + Sync>,
) -> Result<Arc<I>> {
    instance
        .downcast::<I>()
        .map_err(|_| Error::InstanceTypeMismatch(topic.to_string()))
}
