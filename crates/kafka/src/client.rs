use crate::broker::kafka::KafkaConnector;
use crate::broker::BrokerConnector;
use crate::codec::{CodecTable, Payload, SchemaCache};
use crate::config::Settings;
use crate::consumer::Consumer;
use crate::error::Result;
use crate::producer::Producer;
use crate::proto::{ProtoAdapter, TypeKey};
use crate::registry::InstanceRegistry;
use crate::schema_registry::{HttpSchemaRegistry, SchemaRegistry, UnconfiguredSchemaRegistry};
use kafka_types::{Envelope, FailureStrategy, Format};
use protobuf::MessageDyn;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Entry point for typed publishing and consuming.
///
/// Owns the broker connector, the schema registry cache, the protobuf adapter
/// and one producer and consumer per `(payload type, topic)`. Build one per
/// process and share it by reference.
pub struct Client {
    settings: Settings,
    connector: Arc<dyn BrokerConnector>,
    schema_cache: Arc<SchemaCache>,
    adapter: Arc<ProtoAdapter>,
    producers: InstanceRegistry,
    consumers: InstanceRegistry,
    cancel: CancellationToken,
}

impl Client {
    /// Create a client over explicit collaborators. Fails on invalid settings.
    pub fn new(
        settings: Settings,
        connector: Arc<dyn BrokerConnector>,
        schema_registry: Arc<dyn SchemaRegistry>,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            connector,
            schema_cache: Arc::new(SchemaCache::new(schema_registry)),
            adapter: Arc::new(ProtoAdapter::new()),
            producers: InstanceRegistry::new(),
            consumers: InstanceRegistry::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Create a client talking to Kafka and, when configured, an HTTP schema registry.
    pub fn connect(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let schema_registry: Arc<dyn SchemaRegistry> = match settings.schema_registry_config() {
            Some(config) => {
                info!("Using schema registry at {}", config.url);
                Arc::new(HttpSchemaRegistry::new(config)?)
            }
            None => Arc::new(UnconfiguredSchemaRegistry),
        };
        let connector = Arc::new(KafkaConnector::new(settings.clone()));
        Self::new(settings, connector, schema_registry)
    }

    /// Replace the protobuf adapter, e.g. to enable heuristic detection.
    ///
    /// Producers and consumers created earlier keep the adapter they were built with.
    pub fn with_adapter(mut self, adapter: ProtoAdapter) -> Self {
        self.adapter = Arc::new(adapter);
        self
    }

    /// Declare that payloads of type `T` travel as messages of `example`'s type.
    pub fn register_proto_type<T: 'static>(&self, example: &dyn MessageDyn) {
        self.adapter.register_type(TypeKey::of::<T>(), example);
    }

    /// The producer for `topic`, created on first use.
    pub fn producer<T: Payload>(&self, topic: &str) -> Result<Arc<Producer<T>>> {
        self.producers.get_or_create(topic, || {
            let tuning = self.settings.producer_tuning();
            let broker = self.connector.producer(&tuning)?;
            info!("Created producer for {topic} with {} priority", tuning.priority);
            Ok(Producer::new(
                topic,
                broker,
                self.codecs(),
                tuning,
                self.settings.flush_timeout(),
            ))
        })
    }

    /// The consumer for `topic`, created on first use.
    pub fn consumer<T: Payload>(&self, topic: &str) -> Result<Arc<Consumer<T>>> {
        self.consumers.get_or_create(topic, || {
            let tuning = self.settings.consumer_tuning();
            let broker = self.connector.consumer(&tuning)?;
            info!("Created consumer for {topic} with {} priority", tuning.priority);
            Ok(Consumer::new(topic, broker, self.codecs(), tuning, self.cancel.child_token())
                .with_poll_timeout(self.settings.poll_timeout())
                .with_commit_every(self.settings.commit_every))
        })
    }

    pub async fn publish<T: Payload>(
        &self,
        topic: &str,
        envelope: &Envelope<T>,
        format: Format,
    ) -> Result<()> {
        self.producer::<T>(topic)?.publish(envelope, format).await
    }

    /// Consume `topic` on the calling task until the client shuts down.
    pub async fn consume<T, F, Fut>(
        &self,
        topic: &str,
        format: Format,
        strategy: FailureStrategy,
        handler: F,
    ) -> Result<()>
    where
        T: Payload,
        F: FnMut(Envelope<T>) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        self.consumer::<T>(topic)?
            .consume(format, strategy, handler)
            .await
    }

    /// Consume `topic` on a new task.
    pub fn spawn_consumer<T, F, Fut>(
        &self,
        topic: &str,
        format: Format,
        strategy: FailureStrategy,
        handler: F,
    ) -> Result<JoinHandle<Result<()>>>
    where
        T: Payload,
        F: FnMut(Envelope<T>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let consumer = self.consumer::<T>(topic)?;
        Ok(tokio::spawn(async move {
            consumer.consume(format, strategy, handler).await
        }))
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop every running consume loop. Loops finish their current record first.
    pub fn shutdown(&self) {
        info!("Shutting down Kafka client");
        self.cancel.cancel();
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn adapter(&self) -> &ProtoAdapter {
        &self.adapter
    }

    fn codecs<T: Payload>(&self) -> CodecTable<T> {
        CodecTable::standard(self.schema_cache.clone(), self.adapter.clone())
    }
}
