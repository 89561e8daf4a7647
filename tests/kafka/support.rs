use kafka_toolkit::engine::broker::memory::MemoryBroker;
use kafka_toolkit::engine::schema_registry::MemorySchemaRegistry;
use kafka_toolkit::engine::{Client, Envelope, FailureStrategy, Format, Payload, Settings};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct Harness {
    pub broker: MemoryBroker,
    pub registry: Arc<MemorySchemaRegistry>,
    pub client: Client,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(Settings {
            poll_timeout_ms: 5,
            ..Settings::default()
        })
    }

    pub fn with_settings(settings: Settings) -> Self {
        let broker = MemoryBroker::new();
        let registry = Arc::new(MemorySchemaRegistry::new());
        let client = Client::new(settings, Arc::new(broker.clone()), registry.clone())
            .expect("valid settings");
        Self {
            broker,
            registry,
            client,
        }
    }

    /// Consume `topic` until `expected` envelopes arrived or five seconds passed.
    pub async fn collect<T: Payload + Clone>(
        &self,
        topic: &str,
        format: Format,
        strategy: FailureStrategy,
        expected: usize,
    ) -> (kafka_toolkit::engine::Result<()>, Vec<Envelope<T>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let cancel = self.client.cancellation_token();

        let consume = self.client.consume::<T, _, _>(topic, format, strategy, move |envelope| {
            let mut received = sink.lock().unwrap();
            received.push(envelope);
            if received.len() >= expected {
                cancel.cancel();
            }
            async { anyhow::Ok(()) }
        });
        let result = tokio::time::timeout(Duration::from_secs(5), consume)
            .await
            .expect("consumer did not finish in time");

        let received = received.lock().unwrap().clone();
        (result, received)
    }
}
