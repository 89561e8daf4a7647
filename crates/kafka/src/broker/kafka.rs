use crate::broker::{
    BrokerConnector, BrokerConsumer, BrokerProducer, InboundRecord, OutboundRecord, PollEvent,
    RebalanceEvent, RebalanceListener,
};
use crate::config::Settings;
use crate::error::BrokerError;
use async_trait::async_trait;
use kafka_types::{ConsumerTuning, ProducerTuning};
use rdkafka::consumer::{
    CommitMode, Consumer as RdkafkaConsumer, ConsumerContext, Rebalance,
    StreamConsumer as RdkafkaStreamConsumer,
};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{BorrowedMessage, Header, Headers, Message as RdkafkaMessage, OwnedHeaders};
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::{ClientContext, TopicPartitionList};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error};

/// Builds rdkafka producers and consumers from [`Settings`].
pub struct KafkaConnector {
    settings: Settings,
}

impl KafkaConnector {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

impl BrokerConnector for KafkaConnector {
    fn producer(&self, tuning: &ProducerTuning) -> Result<Box<dyn BrokerProducer>, BrokerError> {
        let producer: ThreadedProducer<DeliveryLogger> = self
            .settings
            .producer_config(tuning)
            .create_with_context(DeliveryLogger)?;
        debug!(
            "Created Kafka producer for {} with priority {}",
            self.settings.brokers, tuning.priority
        );
        Ok(Box::new(KafkaProducer { producer }))
    }

    fn consumer(&self, tuning: &ConsumerTuning) -> Result<Box<dyn BrokerConsumer>, BrokerError> {
        let context = RebalanceForwarder::default();
        let consumer: RdkafkaStreamConsumer<RebalanceForwarder> = self
            .settings
            .consumer_config(tuning)
            .create_with_context(context)?;
        debug!(
            "Created Kafka consumer in group {} with priority {}",
            self.settings.group_id, tuning.priority
        );
        Ok(Box::new(KafkaConsumer { consumer }))
    }
}

/// Logs the outcome of every delivery report.
pub struct DeliveryLogger;

impl ClientContext for DeliveryLogger {}

impl ProducerContext for DeliveryLogger {
    type DeliveryOpaque = ();

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, _: Self::DeliveryOpaque) {
        match delivery_result {
            Ok(message) => debug!(
                "Delivered message to {}[{}]@{}",
                message.topic(),
                message.partition(),
                message.offset()
            ),
            Err((e, message)) => error!("Failed to deliver message to {}: {}", message.topic(), e),
        }
    }
}

pub struct KafkaProducer {
    producer: ThreadedProducer<DeliveryLogger>,
}

impl BrokerProducer for KafkaProducer {
    fn send(&self, record: OutboundRecord) -> Result<(), BrokerError> {
        let mut headers = OwnedHeaders::new_with_capacity(record.headers.len());
        for (key, value) in &record.headers {
            headers = headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_slice()),
            });
        }

        let mut base = BaseRecord::<[u8], [u8]>::to(&record.topic)
            .payload(record.payload.as_slice())
            .headers(headers);
        if let Some(key) = &record.key {
            base = base.key(key.as_slice());
        }

        self.producer.send(base).map_err(|(e, _)| BrokerError::Kafka(e))
    }

    fn flush(&self, timeout: Duration) -> Result<(), BrokerError> {
        self.producer.flush(timeout).map_err(BrokerError::Kafka)
    }
}

/// Forwards rebalance callbacks to the listener registered on subscribe.
///
/// Revocations are queued and reported from the next poll, where the consumer
/// handle is available to tell a lost assignment from a handover.
#[derive(Default)]
pub struct RebalanceForwarder {
    listener: Mutex<Option<Arc<dyn RebalanceListener>>>,
    pending_revocations: Mutex<Vec<Vec<(String, i32)>>>,
}

impl RebalanceForwarder {
    fn notify(&self, event: RebalanceEvent) {
        if let Ok(listener) = self.listener.lock() {
            if let Some(listener) = listener.as_ref() {
                listener.on_rebalance(&event);
            }
        }
    }
}

impl ClientContext for RebalanceForwarder {}

impl ConsumerContext for RebalanceForwarder {
    fn pre_rebalance(&self, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Assign(tpl) => self.notify(RebalanceEvent::Assigned(partitions(tpl))),
            Rebalance::Revoke(tpl) => {
                if let Ok(mut pending) = self.pending_revocations.lock() {
                    pending.push(partitions(tpl));
                }
            }
            Rebalance::Error(e) => self.notify(RebalanceEvent::Error(e.to_string())),
        }
    }
}

fn partitions(tpl: &TopicPartitionList) -> Vec<(String, i32)> {
    tpl.elements()
        .iter()
        .map(|element| (element.topic().to_string(), element.partition()))
        .collect()
}

pub struct KafkaConsumer {
    consumer: RdkafkaStreamConsumer<RebalanceForwarder>,
}

impl KafkaConsumer {
    fn report_revocations(&self) {
        let context = self.consumer.context();
        let pending = match context.pending_revocations.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return,
        };
        if pending.is_empty() {
            return;
        }
        let lost = self.consumer.assignment_lost();
        for partitions in pending {
            context.notify(RebalanceEvent::Revoked { partitions, lost });
        }
    }
}

#[async_trait]
impl BrokerConsumer for KafkaConsumer {
    fn subscribe(
        &self,
        topic: &str,
        listener: Arc<dyn RebalanceListener>,
    ) -> Result<(), BrokerError> {
        if let Ok(mut slot) = self.consumer.context().listener.lock() {
            *slot = Some(listener);
        }
        self.consumer.subscribe(&[topic])?;
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Option<PollEvent> {
        self.report_revocations();
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Ok(Ok(msg)) => Some(PollEvent::Record(inbound(&msg))),
            Ok(Err(e)) => Some(PollEvent::Error(BrokerError::Kafka(e))),
            Err(_) => None,
        }
    }

    fn commit(&self) -> Result<(), BrokerError> {
        match self.consumer.commit_consumer_state(CommitMode::Sync) {
            Ok(()) => Ok(()),
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {
                Err(BrokerError::NoOffset)
            }
            Err(e) => Err(BrokerError::Kafka(e)),
        }
    }

    fn unsubscribe(&self) {
        self.consumer.unsubscribe();
        self.report_revocations();
    }
}

fn inbound(msg: &BorrowedMessage<'_>) -> InboundRecord {
    let headers = msg
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|header| {
                    (
                        header.key.to_string(),
                        header.value.map(<[u8]>::to_vec).unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    InboundRecord {
        topic: msg.topic().to_string(),
        partition: msg.partition(),
        offset: msg.offset(),
        key: msg.key().map(|k| k.to_vec()),
        headers,
        payload: msg.payload().map(|p| p.to_vec()),
    }
}
