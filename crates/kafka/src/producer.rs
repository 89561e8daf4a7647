use crate::broker::{BrokerProducer, OutboundRecord};
use crate::codec::{CodecTable, Payload};
use crate::error::Result;
use kafka_types::{Envelope, Format, ProducerTuning, KEY_METADATA_KEY};
use std::time::Duration;
use tracing::debug;

/// Typed producer bound to a single topic.
///
/// Safe to share between tasks; every publish is an independent send followed
/// by a short flush.
pub struct Producer<T: Payload> {
    topic: String,
    broker: Box<dyn BrokerProducer>,
    codecs: CodecTable<T>,
    tuning: ProducerTuning,
    flush_timeout: Duration,
}

impl<T: Payload> Producer<T> {
    pub fn new(
        topic: impl Into<String>,
        broker: Box<dyn BrokerProducer>,
        codecs: CodecTable<T>,
        tuning: ProducerTuning,
        flush_timeout: Duration,
    ) -> Self {
        Self {
            topic: topic.into(),
            broker,
            codecs,
            tuning,
            flush_timeout,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn tuning(&self) -> &ProducerTuning {
        &self.tuning
    }

    /// Encode `envelope` with `format` and hand it to the broker.
    ///
    /// The record key is the `key` metadata entry, or the correlation id when
    /// there is none. Every other metadata entry becomes a header.
    pub async fn publish(&self, envelope: &Envelope<T>, format: Format) -> Result<()> {
        let key = match envelope.key() {
            Some(key) => key.to_vec(),
            None => envelope.correlation_id().to_string().into_bytes(),
        };
        let payload = self
            .codecs
            .encode(format, &self.topic, envelope.data())
            .await?;
        let headers = envelope
            .metadata()
            .iter()
            .filter(|(name, _)| name.as_str() != KEY_METADATA_KEY)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        self.produce_raw(OutboundRecord {
            topic: self.topic.clone(),
            key: Some(key),
            headers,
            payload,
        })
    }

    /// Send a pre-built record and flush.
    pub fn produce_raw(&self, record: OutboundRecord) -> Result<()> {
        debug!(
            "Producing {} bytes to {} with {} headers",
            record.payload.len(),
            record.topic,
            record.headers.len()
        );
        self.broker.send(record)?;
        // The flush only bounds latency; delivery failures are reported by the broker client.
        if let Err(e) = self.broker.flush(self.flush_timeout) {
            debug!("Flush after send to {} did not complete: {e}", self.topic);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::memory::MemoryBroker;
    use crate::broker::BrokerConnector;
    use crate::codec::JsonCodec;
    use crate::error::{BrokerError, Error};
    use kafka_types::{ProducerPriority, CORRELATION_ID_KEY};
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use uuid::Uuid;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        text: String,
    }

    impl Payload for Greeting {}

    fn producer(broker: &MemoryBroker) -> Producer<Greeting> {
        let tuning = ProducerPriority::Balanced.tuning();
        Producer::new(
            "greetings",
            broker.producer(&tuning).unwrap(),
            CodecTable::empty().bind(JsonCodec),
            tuning,
            Duration::from_millis(10),
        )
    }

    fn greeting() -> Greeting {
        Greeting {
            text: "hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_key_defaults_to_correlation_id() {
        let broker = MemoryBroker::new();
        let id = Uuid::new_v4();
        let envelope = Envelope::new(id, greeting(), HashMap::new()).unwrap();

        producer(&broker)
            .publish(&envelope, Format::Json)
            .await
            .unwrap();

        let records = broker.records("greetings");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, Some(id.to_string().into_bytes()));
        assert_eq!(
            records[0].headers,
            vec![(CORRELATION_ID_KEY.to_string(), id.to_string().into_bytes())]
        );
        assert_eq!(records[0].payload.as_deref(), Some(&br#"{"text":"hello"}"#[..]));
        assert_eq!(broker.flush_count(), 1);
    }

    #[tokio::test]
    async fn test_key_metadata_is_not_a_header() {
        let broker = MemoryBroker::new();
        let mut metadata = HashMap::new();
        metadata.insert("tenant".to_string(), b"acme".to_vec());
        let envelope = Envelope::with_key(Uuid::new_v4(), greeting(), "user-7", metadata).unwrap();

        producer(&broker)
            .publish(&envelope, Format::Json)
            .await
            .unwrap();

        let record = &broker.records("greetings")[0];
        assert_eq!(record.key.as_deref(), Some(&b"user-7"[..]));
        let mut names: Vec<_> = record.headers.iter().map(|(name, _)| name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec![CORRELATION_ID_KEY, "tenant"]);
    }

    #[tokio::test]
    async fn test_encode_failure_sends_nothing() {
        let broker = MemoryBroker::new();
        let envelope = Envelope::new(Uuid::new_v4(), greeting(), HashMap::new()).unwrap();

        let result = producer(&broker).publish(&envelope, Format::Avro).await;
        assert!(matches!(result, Err(Error::Codec(_))));
        assert_eq!(broker.send_count(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_is_returned() {
        let broker = MemoryBroker::new();
        broker.reject_sends(true);
        let envelope = Envelope::new(Uuid::new_v4(), greeting(), HashMap::new()).unwrap();

        let result = producer(&broker).publish(&envelope, Format::Json).await;
        assert!(matches!(
            result,
            Err(Error::Broker(BrokerError::Transport { .. }))
        ));
        assert_eq!(broker.flush_count(), 0);
    }
}
