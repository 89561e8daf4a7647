//! Seam between the engine and the broker wire client.
//!
//! The engine never talks to librdkafka directly: producers and consumers hold
//! a [`BrokerProducer`] / [`BrokerConsumer`] handle built by a
//! [`BrokerConnector`]. [`kafka::KafkaConnector`] is the rdkafka-backed
//! implementation; [`memory::MemoryBroker`] runs everything in-process.

pub mod kafka;
pub mod memory;

use crate::error::BrokerError;
use async_trait::async_trait;
use kafka_types::{ConsumerTuning, ProducerTuning};
use std::sync::Arc;
use std::time::Duration;

/// A record ready to be handed to the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRecord {
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub headers: Vec<(String, Vec<u8>)>,
    pub payload: Vec<u8>,
}

/// A record as delivered by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub headers: Vec<(String, Vec<u8>)>,
    pub payload: Option<Vec<u8>>,
}

/// Outcome of a single bounded poll that returned something.
#[derive(Debug)]
pub enum PollEvent {
    Record(InboundRecord),
    Error(BrokerError),
}

/// Partition assignment changes reported by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalanceEvent {
    Assigned(Vec<(String, i32)>),
    Revoked {
        partitions: Vec<(String, i32)>,
        /// The assignment was lost (e.g. session timeout) rather than handed over.
        lost: bool,
    },
    Error(String),
}

pub trait RebalanceListener: Send + Sync {
    fn on_rebalance(&self, event: &RebalanceEvent);
}

pub trait BrokerProducer: Send + Sync {
    /// Queue a record for delivery. Returns once the client accepted it.
    fn send(&self, record: OutboundRecord) -> Result<(), BrokerError>;

    /// Wait at most `timeout` for queued records to be delivered.
    fn flush(&self, timeout: Duration) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait BrokerConsumer: Send + Sync {
    fn subscribe(
        &self,
        topic: &str,
        listener: Arc<dyn RebalanceListener>,
    ) -> Result<(), BrokerError>;

    /// Wait at most `timeout` for the next event. `None` means nothing arrived.
    async fn poll(&self, timeout: Duration) -> Option<PollEvent>;

    /// Commit the offsets of everything delivered so far.
    ///
    /// Returns [`BrokerError::NoOffset`] when there is nothing new to commit.
    fn commit(&self) -> Result<(), BrokerError>;

    fn unsubscribe(&self);
}

/// Builds one broker handle per producer or consumer instance.
pub trait BrokerConnector: Send + Sync {
    fn producer(&self, tuning: &ProducerTuning) -> Result<Box<dyn BrokerProducer>, BrokerError>;

    fn consumer(&self, tuning: &ConsumerTuning) -> Result<Box<dyn BrokerConsumer>, BrokerError>;
}
