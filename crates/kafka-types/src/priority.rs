//! Priority profiles and transport tuning tables.
//!
//! A priority states what a producer or consumer should favour: strict
//! ordering, a middle ground, or raw throughput. Each profile resolves to a
//! complete, fixed bundle of librdkafka properties. Resolution is total:
//! unrecognised or empty input falls back to [`ProducerPriority::Balanced`] /
//! [`ConsumerPriority::Balanced`] and is logged, never rejected.

use crate::security::AutoOffsetReset;
use std::fmt;
use std::time::Duration;

/// Which side of the pipe a priority string is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

/// Priority profile of a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProducerPriority {
    Order,
    #[default]
    Balanced,
    HighPerformance,
}

/// Priority profile of a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConsumerPriority {
    Order,
    #[default]
    Balanced,
    HighPerformance,
    Risky,
}

fn normalize(value: &str) -> String {
    value.trim().to_ascii_uppercase().replace('-', "_")
}

impl ProducerPriority {
    /// Parse a priority name. Never fails.
    pub fn parse(value: &str) -> Self {
        match normalize(value).as_str() {
            "ORDER" => ProducerPriority::Order,
            "BALANCED" => ProducerPriority::Balanced,
            "HIGH_PERFORMANCE" => ProducerPriority::HighPerformance,
            "" => ProducerPriority::default(),
            _ => {
                tracing::warn!(
                    "Unknown producer priority '{}', falling back to {}",
                    value,
                    ProducerPriority::default()
                );
                ProducerPriority::default()
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProducerPriority::Order => "ORDER",
            ProducerPriority::Balanced => "BALANCED",
            ProducerPriority::HighPerformance => "HIGH_PERFORMANCE",
        }
    }

    pub fn tuning(self) -> ProducerTuning {
        ProducerTuning::for_priority(self)
    }
}

impl ConsumerPriority {
    /// Parse a priority name. Never fails.
    pub fn parse(value: &str) -> Self {
        match normalize(value).as_str() {
            "ORDER" => ConsumerPriority::Order,
            "BALANCED" => ConsumerPriority::Balanced,
            "HIGH_PERFORMANCE" => ConsumerPriority::HighPerformance,
            "RISKY" => ConsumerPriority::Risky,
            "" => ConsumerPriority::default(),
            _ => {
                tracing::warn!(
                    "Unknown consumer priority '{}', falling back to {}",
                    value,
                    ConsumerPriority::default()
                );
                ConsumerPriority::default()
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerPriority::Order => "ORDER",
            ConsumerPriority::Balanced => "BALANCED",
            ConsumerPriority::HighPerformance => "HIGH_PERFORMANCE",
            ConsumerPriority::Risky => "RISKY",
        }
    }

    pub fn tuning(self) -> ConsumerTuning {
        ConsumerTuning::for_priority(self)
    }
}

impl fmt::Display for ProducerPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ConsumerPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acks {
    /// Every in-sync replica must acknowledge.
    All,
    /// Only the partition leader acknowledges.
    Leader,
}

impl Acks {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acks::All => "all",
            Acks::Leader => "1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Snappy,
    Lz4,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Snappy => "snappy",
            Compression::Lz4 => "lz4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoCommit {
    /// The consumer loop commits explicitly.
    Manual,
    /// The client commits in the background every `interval`.
    Automatic { interval: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
    ReadUncommitted,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::ReadUncommitted => "read_uncommitted",
        }
    }
}

/// Producer transport tuning resolved from a [`ProducerPriority`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerTuning {
    pub priority: ProducerPriority,
    pub acks: Acks,
    pub retries: u32,
    pub idempotence: bool,
    pub max_in_flight: u32,
    /// Maximum number of messages batched in one request.
    pub batch_size: u32,
    pub linger: Duration,
    pub compression: Compression,
    pub queue_buffering_max_messages: u32,
    pub queue_buffering_max_kbytes: u32,
    pub queue_buffering_max: Duration,
    pub request_timeout: Duration,
    pub message_timeout: Duration,
    pub retry_backoff: Duration,
    pub socket_keepalive: bool,
}

impl ProducerTuning {
    pub fn for_priority(priority: ProducerPriority) -> Self {
        match priority {
            ProducerPriority::Order => Self {
                priority,
                acks: Acks::All,
                retries: 5,
                idempotence: true,
                max_in_flight: 1,
                batch_size: 1_000,
                linger: Duration::ZERO,
                compression: Compression::Snappy,
                queue_buffering_max_messages: 100_000,
                queue_buffering_max_kbytes: 1_048_576,
                queue_buffering_max: Duration::ZERO,
                request_timeout: Duration::from_millis(30_000),
                message_timeout: Duration::from_millis(120_000),
                retry_backoff: Duration::from_millis(100),
                socket_keepalive: false,
            },
            ProducerPriority::Balanced => Self {
                priority,
                acks: Acks::All,
                retries: 3,
                idempotence: true,
                max_in_flight: 5,
                batch_size: 10_000,
                linger: Duration::from_millis(5),
                compression: Compression::Lz4,
                queue_buffering_max_messages: 200_000,
                queue_buffering_max_kbytes: 2_097_152,
                queue_buffering_max: Duration::from_millis(5),
                request_timeout: Duration::from_millis(30_000),
                message_timeout: Duration::from_millis(120_000),
                retry_backoff: Duration::from_millis(100),
                socket_keepalive: false,
            },
            ProducerPriority::HighPerformance => Self {
                priority,
                acks: Acks::Leader,
                retries: 1,
                idempotence: false,
                max_in_flight: 10,
                batch_size: 50_000,
                linger: Duration::from_millis(10),
                compression: Compression::Lz4,
                queue_buffering_max_messages: 500_000,
                queue_buffering_max_kbytes: 4_194_304,
                queue_buffering_max: Duration::from_millis(10),
                request_timeout: Duration::from_millis(20_000),
                message_timeout: Duration::from_millis(60_000),
                retry_backoff: Duration::from_millis(100),
                socket_keepalive: true,
            },
        }
    }

    /// librdkafka properties for this bundle, in application order.
    pub fn properties(&self) -> Vec<(&'static str, String)> {
        let mut props = vec![
            ("acks", self.acks.as_str().to_string()),
            ("retries", self.retries.to_string()),
            ("enable.idempotence", self.idempotence.to_string()),
            (
                "max.in.flight.requests.per.connection",
                self.max_in_flight.to_string(),
            ),
            ("batch.num.messages", self.batch_size.to_string()),
            ("linger.ms", millis(self.linger)),
            ("compression.type", self.compression.as_str().to_string()),
            (
                "queue.buffering.max.messages",
                self.queue_buffering_max_messages.to_string(),
            ),
            (
                "queue.buffering.max.kbytes",
                self.queue_buffering_max_kbytes.to_string(),
            ),
            ("queue.buffering.max.ms", millis(self.queue_buffering_max)),
            ("request.timeout.ms", millis(self.request_timeout)),
            ("message.timeout.ms", millis(self.message_timeout)),
            ("retry.backoff.ms", millis(self.retry_backoff)),
        ];
        if self.socket_keepalive {
            props.push(("socket.keepalive.enable", "true".to_string()));
        }
        props
    }
}

/// Consumer transport tuning resolved from a [`ConsumerPriority`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerTuning {
    pub priority: ConsumerPriority,
    pub auto_commit: AutoCommit,
    /// Where to start when the group has no committed offset. Overridable.
    pub auto_offset_reset: AutoOffsetReset,
    pub isolation: IsolationLevel,
    pub fetch_min_bytes: u32,
    pub max_poll_interval: Duration,
    pub max_partition_fetch_bytes: u32,
    pub fetch_max_bytes: u32,
    pub fetch_message_max_bytes: Option<u32>,
    pub session_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub fetch_wait_max: Duration,
    pub retry_backoff: Duration,
    pub fetch_error_backoff: Duration,
    pub reconnect_backoff: Option<Duration>,
}

impl ConsumerTuning {
    pub fn for_priority(priority: ConsumerPriority) -> Self {
        match priority {
            ConsumerPriority::Order => Self {
                priority,
                auto_commit: AutoCommit::Manual,
                auto_offset_reset: AutoOffsetReset::Earliest,
                isolation: IsolationLevel::ReadCommitted,
                fetch_min_bytes: 1,
                max_poll_interval: Duration::from_secs(300),
                max_partition_fetch_bytes: 1_048_576,
                fetch_max_bytes: 5_242_880,
                fetch_message_max_bytes: None,
                session_timeout: Duration::from_millis(10_000),
                heartbeat_interval: Duration::from_millis(3_000),
                fetch_wait_max: Duration::from_millis(500),
                retry_backoff: Duration::from_millis(100),
                fetch_error_backoff: Duration::from_millis(500),
                reconnect_backoff: None,
            },
            ConsumerPriority::Balanced => Self {
                priority,
                auto_commit: AutoCommit::Manual,
                auto_offset_reset: AutoOffsetReset::Earliest,
                isolation: IsolationLevel::ReadCommitted,
                fetch_min_bytes: 1_024,
                max_poll_interval: Duration::from_secs(300),
                max_partition_fetch_bytes: 1_048_576,
                fetch_max_bytes: 10_485_760,
                fetch_message_max_bytes: Some(262_144),
                session_timeout: Duration::from_millis(30_000),
                heartbeat_interval: Duration::from_millis(10_000),
                fetch_wait_max: Duration::from_millis(1_000),
                retry_backoff: Duration::from_millis(200),
                fetch_error_backoff: Duration::from_millis(500),
                reconnect_backoff: None,
            },
            ConsumerPriority::HighPerformance => Self {
                priority,
                auto_commit: AutoCommit::Automatic {
                    interval: Duration::from_millis(5_000),
                },
                auto_offset_reset: AutoOffsetReset::Latest,
                isolation: IsolationLevel::ReadUncommitted,
                fetch_min_bytes: 65_536,
                max_poll_interval: Duration::from_secs(600),
                max_partition_fetch_bytes: 10_485_760,
                fetch_max_bytes: 52_428_800,
                fetch_message_max_bytes: Some(1_048_576),
                session_timeout: Duration::from_millis(60_000),
                heartbeat_interval: Duration::from_millis(20_000),
                fetch_wait_max: Duration::from_millis(100),
                retry_backoff: Duration::from_millis(50),
                fetch_error_backoff: Duration::from_millis(200),
                reconnect_backoff: None,
            },
            ConsumerPriority::Risky => Self {
                priority,
                auto_commit: AutoCommit::Automatic {
                    interval: Duration::from_millis(1_000),
                },
                auto_offset_reset: AutoOffsetReset::Latest,
                isolation: IsolationLevel::ReadUncommitted,
                fetch_min_bytes: 131_072,
                max_poll_interval: Duration::from_secs(900),
                max_partition_fetch_bytes: 52_428_800,
                fetch_max_bytes: 104_857_600,
                fetch_message_max_bytes: Some(4_194_304),
                session_timeout: Duration::from_millis(120_000),
                heartbeat_interval: Duration::from_millis(40_000),
                fetch_wait_max: Duration::from_millis(50),
                retry_backoff: Duration::from_millis(10),
                fetch_error_backoff: Duration::from_millis(100),
                reconnect_backoff: Some(Duration::from_millis(10)),
            },
        }
    }

    /// Replace the profile's offset-reset default with an explicit choice.
    pub fn with_offset_reset(mut self, reset: Option<AutoOffsetReset>) -> Self {
        if let Some(reset) = reset {
            self.auto_offset_reset = reset;
        }
        self
    }

    /// librdkafka properties for this bundle, in application order.
    pub fn properties(&self) -> Vec<(&'static str, String)> {
        let mut props = Vec::with_capacity(16);
        match self.auto_commit {
            AutoCommit::Manual => props.push(("enable.auto.commit", "false".to_string())),
            AutoCommit::Automatic { interval } => {
                props.push(("enable.auto.commit", "true".to_string()));
                props.push(("auto.commit.interval.ms", millis(interval)));
            }
        }
        props.push(("auto.offset.reset", self.auto_offset_reset.as_str().to_string()));
        props.push(("isolation.level", self.isolation.as_str().to_string()));
        props.push(("fetch.min.bytes", self.fetch_min_bytes.to_string()));
        props.push(("max.poll.interval.ms", millis(self.max_poll_interval)));
        props.push((
            "max.partition.fetch.bytes",
            self.max_partition_fetch_bytes.to_string(),
        ));
        props.push(("fetch.max.bytes", self.fetch_max_bytes.to_string()));
        if let Some(bytes) = self.fetch_message_max_bytes {
            props.push(("fetch.message.max.bytes", bytes.to_string()));
        }
        props.push(("session.timeout.ms", millis(self.session_timeout)));
        props.push(("heartbeat.interval.ms", millis(self.heartbeat_interval)));
        props.push(("fetch.wait.max.ms", millis(self.fetch_wait_max)));
        props.push(("retry.backoff.ms", millis(self.retry_backoff)));
        props.push(("fetch.error.backoff.ms", millis(self.fetch_error_backoff)));
        if let Some(backoff) = self.reconnect_backoff {
            props.push(("reconnect.backoff.ms", millis(backoff)));
        }
        props
    }
}

fn millis(duration: Duration) -> String {
    duration.as_millis().to_string()
}

/// A resolved bundle for either role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuningBundle {
    Producer(ProducerTuning),
    Consumer(ConsumerTuning),
}

impl TuningBundle {
    pub fn properties(&self) -> Vec<(&'static str, String)> {
        match self {
            TuningBundle::Producer(tuning) => tuning.properties(),
            TuningBundle::Consumer(tuning) => tuning.properties(),
        }
    }
}

/// Resolve a free-form priority string for `role`. Never fails.
pub fn resolve(role: Role, value: &str) -> TuningBundle {
    match role {
        Role::Producer => TuningBundle::Producer(ProducerPriority::parse(value).tuning()),
        Role::Consumer => TuningBundle::Consumer(ConsumerPriority::parse(value).tuning()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer(value: &str) -> ProducerTuning {
        match resolve(Role::Producer, value) {
            TuningBundle::Producer(tuning) => tuning,
            other => panic!("expected producer bundle, got {other:?}"),
        }
    }

    fn consumer(value: &str) -> ConsumerTuning {
        match resolve(Role::Consumer, value) {
            TuningBundle::Consumer(tuning) => tuning,
            other => panic!("expected consumer bundle, got {other:?}"),
        }
    }

    // ==========================================================================
    // Fallback
    // ==========================================================================

    #[test]
    fn test_unknown_values_fall_back_to_balanced() {
        for value in ["", "   ", "fastest", "RISKY_ORDER", "0", "ordered"] {
            assert_eq!(producer(value).priority, ProducerPriority::Balanced);
            assert_eq!(consumer(value).priority, ConsumerPriority::Balanced);
        }
    }

    #[test]
    fn test_risky_is_consumer_only() {
        assert_eq!(producer("RISKY").priority, ProducerPriority::Balanced);
        assert_eq!(consumer("RISKY").priority, ConsumerPriority::Risky);
    }

    #[test]
    fn test_parsing_ignores_case_and_dashes() {
        assert_eq!(producer("order").priority, ProducerPriority::Order);
        assert_eq!(
            producer("high-performance").priority,
            ProducerPriority::HighPerformance
        );
        assert_eq!(
            consumer(" High_Performance ").priority,
            ConsumerPriority::HighPerformance
        );
    }

    // ==========================================================================
    // Producer table
    // ==========================================================================

    #[test]
    fn test_producer_key_parameters() {
        let rows = [
            ("ORDER", Acks::All, 5, true, 1, 1_000, 0, Compression::Snappy),
            ("BALANCED", Acks::All, 3, true, 5, 10_000, 5, Compression::Lz4),
            (
                "HIGH_PERFORMANCE",
                Acks::Leader,
                1,
                false,
                10,
                50_000,
                10,
                Compression::Lz4,
            ),
        ];

        for (name, acks, retries, idempotence, in_flight, batch, linger_ms, compression) in rows {
            let tuning = producer(name);
            assert_eq!(tuning.acks, acks, "{name}");
            assert_eq!(tuning.retries, retries, "{name}");
            assert_eq!(tuning.idempotence, idempotence, "{name}");
            assert_eq!(tuning.max_in_flight, in_flight, "{name}");
            assert_eq!(tuning.batch_size, batch, "{name}");
            assert_eq!(tuning.linger, Duration::from_millis(linger_ms), "{name}");
            assert_eq!(tuning.compression, compression, "{name}");
        }
    }

    #[test]
    fn test_producer_properties_for_high_performance() {
        let props = producer("HIGH_PERFORMANCE").properties();
        let get = |key: &str| {
            props
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("acks"), Some("1"));
        assert_eq!(get("enable.idempotence"), Some("false"));
        assert_eq!(get("compression.type"), Some("lz4"));
        assert_eq!(get("socket.keepalive.enable"), Some("true"));
        assert_eq!(get("message.timeout.ms"), Some("60000"));
    }

    #[test]
    fn test_keepalive_only_for_high_performance() {
        for name in ["ORDER", "BALANCED"] {
            let props = producer(name).properties();
            assert!(props.iter().all(|(k, _)| *k != "socket.keepalive.enable"));
        }
    }

    // ==========================================================================
    // Consumer table
    // ==========================================================================

    #[test]
    fn test_consumer_key_parameters() {
        let rows = [
            (
                "ORDER",
                AutoCommit::Manual,
                AutoOffsetReset::Earliest,
                IsolationLevel::ReadCommitted,
                1,
                300,
            ),
            (
                "BALANCED",
                AutoCommit::Manual,
                AutoOffsetReset::Earliest,
                IsolationLevel::ReadCommitted,
                1_024,
                300,
            ),
            (
                "HIGH_PERFORMANCE",
                AutoCommit::Automatic {
                    interval: Duration::from_millis(5_000),
                },
                AutoOffsetReset::Latest,
                IsolationLevel::ReadUncommitted,
                65_536,
                600,
            ),
            (
                "RISKY",
                AutoCommit::Automatic {
                    interval: Duration::from_millis(1_000),
                },
                AutoOffsetReset::Latest,
                IsolationLevel::ReadUncommitted,
                131_072,
                900,
            ),
        ];

        for (name, auto_commit, reset, isolation, fetch_min, poll_secs) in rows {
            let tuning = consumer(name);
            assert_eq!(tuning.auto_commit, auto_commit, "{name}");
            assert_eq!(tuning.auto_offset_reset, reset, "{name}");
            assert_eq!(tuning.isolation, isolation, "{name}");
            assert_eq!(tuning.fetch_min_bytes, fetch_min, "{name}");
            assert_eq!(
                tuning.max_poll_interval,
                Duration::from_secs(poll_secs),
                "{name}"
            );
        }
    }

    #[test]
    fn test_manual_commit_omits_interval() {
        let props = consumer("ORDER").properties();
        assert!(props.contains(&("enable.auto.commit", "false".to_string())));
        assert!(props.iter().all(|(k, _)| *k != "auto.commit.interval.ms"));
        assert!(props.iter().all(|(k, _)| *k != "fetch.message.max.bytes"));
    }

    #[test]
    fn test_risky_sets_reconnect_backoff() {
        let props = consumer("RISKY").properties();
        assert!(props.contains(&("reconnect.backoff.ms", "10".to_string())));
        assert!(props.contains(&("auto.commit.interval.ms", "1000".to_string())));
    }

    #[test]
    fn test_explicit_offset_reset_overrides_profile_default() {
        let tuning = consumer("ORDER").with_offset_reset(Some(AutoOffsetReset::Latest));
        assert_eq!(tuning.auto_offset_reset, AutoOffsetReset::Latest);

        let tuning = consumer("ORDER").with_offset_reset(None);
        assert_eq!(tuning.auto_offset_reset, AutoOffsetReset::Earliest);
    }
}
