//! Typed consumer and its poll loop.
//!
//! A consume call walks these states until cancelled:
//!
//! ```text
//! Subscribed -> Polling <-> Handling -> Committing | SkippingCommit -> Polling
//!                  \______________________________________________-> Stopped
//! ```
//!
//! Polling, decoding, handling and committing all happen sequentially on the
//! calling task. Cancellation is checked between iterations and while waiting
//! on the broker, never while a handler runs.

use crate::broker::{BrokerConsumer, InboundRecord, PollEvent, RebalanceEvent, RebalanceListener};
use crate::codec::{CodecTable, Payload};
use crate::error::{BrokerError, CodecError, Error, Result};
use kafka_types::{
    AutoCommit, ConsumerTuning, Envelope, FailureStrategy, Format, CORRELATION_ID_KEY,
    KEY_METADATA_KEY,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Tracks partition assignment changes for one consumer.
#[derive(Debug, Default)]
pub struct RebalanceState {
    topic: String,
    lost: AtomicBool,
}

impl RebalanceState {
    fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            lost: AtomicBool::new(false),
        }
    }

    /// Whether an assignment was ever taken away involuntarily.
    pub fn assignment_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }
}

impl RebalanceListener for RebalanceState {
    fn on_rebalance(&self, event: &RebalanceEvent) {
        match event {
            RebalanceEvent::Assigned(partitions) => {
                info!("Consumer on {} assigned {partitions:?}", self.topic);
            }
            RebalanceEvent::Revoked {
                partitions,
                lost: true,
            } => {
                self.lost.store(true, Ordering::SeqCst);
                warn!(
                    "Consumer on {} lost {partitions:?} involuntarily; uncommitted records will be redelivered",
                    self.topic
                );
            }
            RebalanceEvent::Revoked { partitions, .. } => {
                info!("Consumer on {} revoked {partitions:?}", self.topic);
            }
            RebalanceEvent::Error(message) => {
                error!("Rebalance error on {}: {message}", self.topic);
            }
        }
    }
}

enum State {
    Subscribed,
    Polling,
    Handling(InboundRecord),
    Committing,
    SkippingCommit,
    Stopped,
}

/// Typed consumer bound to a single topic.
pub struct Consumer<T: Payload> {
    topic: String,
    broker: Box<dyn BrokerConsumer>,
    codecs: CodecTable<T>,
    tuning: ConsumerTuning,
    poll_timeout: Duration,
    commit_every: u64,
    session: Mutex<()>,
    rebalance: Arc<RebalanceState>,
    cancel: CancellationToken,
}

impl<T: Payload> Consumer<T> {
    pub fn new(
        topic: impl Into<String>,
        broker: Box<dyn BrokerConsumer>,
        codecs: CodecTable<T>,
        tuning: ConsumerTuning,
        cancel: CancellationToken,
    ) -> Self {
        let topic = topic.into();
        Self {
            rebalance: Arc::new(RebalanceState::new(&topic)),
            topic,
            broker,
            codecs,
            tuning,
            poll_timeout: Duration::from_millis(100),
            commit_every: 10,
            session: Mutex::new(()),
            cancel,
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Commit after every `commit_every` handled records. Zero is treated as one.
    pub fn with_commit_every(mut self, commit_every: u64) -> Self {
        self.commit_every = commit_every.max(1);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn tuning(&self) -> &ConsumerTuning {
        &self.tuning
    }

    pub fn assignment_lost(&self) -> bool {
        self.rebalance.assignment_lost()
    }

    /// Subscribe and hand every decoded record to `handler` until cancelled.
    ///
    /// Returns `Ok(())` on cancellation. Decode failures end the call only
    /// under [`FailureStrategy::StopHost`]; handler errors are logged and
    /// never end it.
    pub async fn consume<F, Fut>(
        &self,
        format: Format,
        strategy: FailureStrategy,
        mut handler: F,
    ) -> Result<()>
    where
        F: FnMut(Envelope<T>) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        let _session = self
            .session
            .try_lock()
            .map_err(|_| Error::ConsumerBusy(self.topic.clone()))?;

        self.broker.subscribe(&self.topic, self.rebalance.clone())?;
        info!(
            "Consuming {} as {format} with {} priority",
            self.topic, self.tuning.priority
        );

        let result = self.run(format, strategy, &mut handler).await;
        self.broker.unsubscribe();
        result
    }

    async fn run<F, Fut>(
        &self,
        format: Format,
        strategy: FailureStrategy,
        handler: &mut F,
    ) -> Result<()>
    where
        F: FnMut(Envelope<T>) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        let mut handled: u64 = 0;
        let mut state = State::Subscribed;
        loop {
            state = match state {
                State::Subscribed => State::Polling,
                State::Polling if self.cancel.is_cancelled() => State::Stopped,
                State::Polling => tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => State::Stopped,
                    event = self.broker.poll(self.poll_timeout) => match event {
                        None => State::Polling,
                        Some(PollEvent::Record(record)) => State::Handling(record),
                        Some(PollEvent::Error(e)) if e.is_fatal() => {
                            error!("Fatal broker error on {}: {e}", self.topic);
                            return Err(e.into());
                        }
                        Some(PollEvent::Error(e)) => {
                            warn!("Broker error on {}: {e}", self.topic);
                            State::Polling
                        }
                    },
                },
                State::Handling(record) => match self.envelope(format, &record).await {
                    Ok(envelope) => {
                        let correlation_id = envelope.correlation_id();
                        if let Err(e) = handler(envelope).await {
                            error!(
                                "Handler failed for {}[{}]@{} ({correlation_id}): {e:#}",
                                record.topic, record.partition, record.offset
                            );
                        }
                        handled += 1;
                        if self.commits_manually() && handled % self.commit_every == 0 {
                            State::Committing
                        } else {
                            State::SkippingCommit
                        }
                    }
                    Err(source) => {
                        let failure = Error::Deserialization {
                            topic: record.topic,
                            partition: record.partition,
                            offset: record.offset,
                            source,
                        };
                        match strategy {
                            FailureStrategy::StopHost => {
                                error!("{failure}; stopping");
                                return Err(failure);
                            }
                            FailureStrategy::IgnoreMessage => {
                                warn!("{failure}; skipping record");
                                State::Polling
                            }
                        }
                    }
                },
                State::Committing => {
                    match self.broker.commit() {
                        Ok(()) => debug!("Committed {} after {handled} records", self.topic),
                        Err(BrokerError::NoOffset) => {}
                        Err(e) => warn!("Commit on {} failed: {e}", self.topic),
                    }
                    State::Polling
                }
                State::SkippingCommit => State::Polling,
                State::Stopped => {
                    info!("Consumer on {} stopped after {handled} records", self.topic);
                    return Ok(());
                }
            };
        }
    }

    fn commits_manually(&self) -> bool {
        self.tuning.auto_commit == AutoCommit::Manual
    }

    async fn envelope(
        &self,
        format: Format,
        record: &InboundRecord,
    ) -> std::result::Result<Envelope<T>, CodecError> {
        let payload = match record.payload.as_deref() {
            Some(payload) if !payload.is_empty() => payload,
            _ => return Err(CodecError::failure(format, "record has no value")),
        };
        let data = self.codecs.decode(format, &record.topic, payload).await?;

        let mut metadata: HashMap<String, Vec<u8>> = record
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case(CORRELATION_ID_KEY))
            .cloned()
            .collect();
        if let Some(key) = &record.key {
            metadata.insert(KEY_METADATA_KEY.to_string(), key.clone());
        }
        Ok(Envelope::from_record(
            correlation_from_headers(&record.headers),
            data,
            metadata,
        ))
    }
}

/// Correlation id carried by the record headers, or a fresh one when the
/// header is absent, unparsable or nil.
pub fn correlation_from_headers(headers: &[(String, Vec<u8>)]) -> Uuid {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(CORRELATION_ID_KEY))
        .and_then(|(_, value)| std::str::from_utf8(value).ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .filter(|id| !id.is_nil())
        .unwrap_or_else(Uuid::new_v4)
}
