//! In-process broker.
//!
//! Every topic is a single partition log kept in memory. Consumers share one
//! committed offset per topic, mimicking a single consumer group. Counters
//! for sends, flushes and commits let tests observe what the engine did.

use crate::broker::{
    BrokerConnector, BrokerConsumer, BrokerProducer, InboundRecord, OutboundRecord, PollEvent,
    RebalanceEvent, RebalanceListener,
};
use crate::error::BrokerError;
use async_trait::async_trait;
use kafka_types::{ConsumerTuning, ProducerTuning};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Default)]
struct State {
    topics: HashMap<String, Vec<InboundRecord>>,
    committed: HashMap<String, i64>,
    injected: VecDeque<BrokerError>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    appended: Notify,
    sends: AtomicUsize,
    flushes: AtomicUsize,
    commits: AtomicUsize,
    reject_sends: AtomicBool,
    listeners: Mutex<Vec<(String, Arc<dyn RebalanceListener>)>>,
}

#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-update; the data is still usable.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a record directly, bypassing any producer.
    pub fn append(&self, record: OutboundRecord) -> i64 {
        let offset = {
            let mut state = self.state();
            let log = state.topics.entry(record.topic.clone()).or_default();
            let offset = log.len() as i64;
            log.push(InboundRecord {
                topic: record.topic,
                partition: 0,
                offset,
                key: record.key,
                headers: record.headers,
                payload: Some(record.payload),
            });
            offset
        };
        self.inner.appended.notify_waiters();
        offset
    }

    /// All records written to `topic` so far.
    pub fn records(&self, topic: &str) -> Vec<InboundRecord> {
        self.state().topics.get(topic).cloned().unwrap_or_default()
    }

    /// Next offset the group would read from `topic`, if anything was committed.
    pub fn committed_offset(&self, topic: &str) -> Option<i64> {
        self.state().committed.get(topic).copied()
    }

    pub fn send_count(&self) -> usize {
        self.inner.sends.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.inner.flushes.load(Ordering::SeqCst)
    }

    /// Number of commit calls, including those answered with "no offset".
    pub fn commit_count(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Make every subsequent send fail.
    pub fn reject_sends(&self, reject: bool) {
        self.inner.reject_sends.store(reject, Ordering::SeqCst);
    }

    /// Queue an error event for the next poll of any consumer.
    pub fn inject_error(&self, error: BrokerError) {
        self.state().injected.push_back(error);
        self.inner.appended.notify_waiters();
    }

    /// Report a revocation of `topic` to every subscribed consumer.
    pub fn revoke(&self, topic: &str, lost: bool) {
        let listeners = self
            .inner
            .listeners
            .lock()
            .map(|listeners| listeners.clone())
            .unwrap_or_default();
        for (subscribed, listener) in listeners {
            if subscribed == topic {
                listener.on_rebalance(&RebalanceEvent::Revoked {
                    partitions: vec![(topic.to_string(), 0)],
                    lost,
                });
            }
        }
    }
}

impl BrokerConnector for MemoryBroker {
    fn producer(&self, _tuning: &ProducerTuning) -> Result<Box<dyn BrokerProducer>, BrokerError> {
        Ok(Box::new(MemoryProducer {
            broker: self.clone(),
        }))
    }

    fn consumer(&self, tuning: &ConsumerTuning) -> Result<Box<dyn BrokerConsumer>, BrokerError> {
        Ok(Box::new(MemoryConsumer {
            broker: self.clone(),
            from_beginning: tuning.auto_offset_reset.starts_from_beginning(),
            subscription: Mutex::new(None),
        }))
    }
}

pub struct MemoryProducer {
    broker: MemoryBroker,
}

impl BrokerProducer for MemoryProducer {
    fn send(&self, record: OutboundRecord) -> Result<(), BrokerError> {
        if self.broker.inner.reject_sends.load(Ordering::SeqCst) {
            return Err(BrokerError::Transport {
                message: format!("send to {} rejected", record.topic),
                fatal: false,
            });
        }
        self.broker.inner.sends.fetch_add(1, Ordering::SeqCst);
        self.broker.append(record);
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> Result<(), BrokerError> {
        self.broker.inner.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Subscription {
    topic: String,
    /// Next offset to deliver.
    position: i64,
    /// Position at the last successful commit.
    committed: i64,
}

pub struct MemoryConsumer {
    broker: MemoryBroker,
    from_beginning: bool,
    subscription: Mutex<Option<Subscription>>,
}

impl MemoryConsumer {
    fn subscription(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_next(&self) -> Option<PollEvent> {
        let mut state = self.broker.state();
        if let Some(error) = state.injected.pop_front() {
            return Some(PollEvent::Error(error));
        }
        let mut subscription = self.subscription();
        let subscription = subscription.as_mut()?;
        let record = state
            .topics
            .get(&subscription.topic)
            .and_then(|log| log.get(subscription.position as usize))
            .cloned()?;
        subscription.position += 1;
        Some(PollEvent::Record(record))
    }
}

#[async_trait]
impl BrokerConsumer for MemoryConsumer {
    fn subscribe(
        &self,
        topic: &str,
        listener: Arc<dyn RebalanceListener>,
    ) -> Result<(), BrokerError> {
        let start = {
            let state = self.broker.state();
            match state.committed.get(topic) {
                Some(offset) => *offset,
                None if self.from_beginning => 0,
                None => state.topics.get(topic).map_or(0, |log| log.len() as i64),
            }
        };
        *self.subscription() = Some(Subscription {
            topic: topic.to_string(),
            position: start,
            committed: start,
        });
        if let Ok(mut listeners) = self.broker.inner.listeners.lock() {
            listeners.push((topic.to_string(), listener.clone()));
        }
        listener.on_rebalance(&RebalanceEvent::Assigned(vec![(topic.to_string(), 0)]));
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Option<PollEvent> {
        let appended = self.broker.inner.appended.notified();
        if let Some(event) = self.try_next() {
            return Some(event);
        }
        let _ = tokio::time::timeout(timeout, appended).await;
        self.try_next()
    }

    fn commit(&self) -> Result<(), BrokerError> {
        self.broker.inner.commits.fetch_add(1, Ordering::SeqCst);
        let mut subscription = self.subscription();
        let Some(subscription) = subscription.as_mut() else {
            return Err(BrokerError::NoOffset);
        };
        if subscription.position == subscription.committed {
            return Err(BrokerError::NoOffset);
        }
        subscription.committed = subscription.position;
        self.broker
            .state()
            .committed
            .insert(subscription.topic.clone(), subscription.position);
        Ok(())
    }

    fn unsubscribe(&self) {
        let Some(subscription) = self.subscription().take() else {
            return;
        };
        if let Ok(mut listeners) = self.broker.inner.listeners.lock() {
            listeners.retain(|(topic, _)| *topic != subscription.topic);
        }
    }
}
