//! Connection settings, read from flags or `KAFKA_*` environment variables.

use crate::error::ConfigError;
use crate::schema_registry::HttpRegistryConfig;
use clap::Parser;
use kafka_types::{
    AutoOffsetReset, ConsumerPriority, ConsumerTuning, ProducerPriority, ProducerTuning,
    SaslMechanism, SchemaRegistryAuth, SecurityProtocol,
};
use rdkafka::config::ClientConfig;
use std::convert::Infallible;
use std::time::Duration;

const DEFAULT_CLIENT_ID: &str = "kafka-toolkit";

#[derive(Parser, Debug, Clone)]
pub struct Settings {
    /// Kafka brokers (comma-separated list)
    #[arg(long, default_value = "", env = "KAFKA_BROKERS")]
    pub brokers: String,

    /// Consumer group ID
    #[arg(long, default_value = "", env = "KAFKA_GROUPID")]
    pub group_id: String,

    /// Where a group without committed offsets starts. Defaults to the
    /// consumer priority's choice.
    #[arg(long, env = "KAFKA_AUTO_OFFSET_RESET", value_parser = parse_offset_reset)]
    pub auto_offset_reset: Option<AutoOffsetReset>,

    #[arg(
        long,
        default_value = "plaintext",
        env = "KAFKA_SECURITY_PROTOCOL",
        value_parser = parse_security_protocol
    )]
    pub security_protocol: SecurityProtocol,

    #[arg(
        long,
        default_value = "PLAIN",
        env = "KAFKA_SASL_MECHANISM",
        value_parser = parse_sasl_mechanism
    )]
    pub sasl_mechanism: SaslMechanism,

    #[arg(long, default_value = "", env = "KAFKA_USERNAME")]
    pub username: String,

    #[arg(long, default_value = "", env = "KAFKA_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Socket request timeout in milliseconds
    #[arg(long = "timeout-ms", default_value_t = 5000, env = "KAFKA_TIMEOUT")]
    pub request_timeout_ms: u64,

    #[arg(
        long,
        default_value = "BALANCED",
        env = "KAFKA_PRODUCER_PRIORITY",
        value_parser = parse_producer_priority
    )]
    pub producer_priority: ProducerPriority,

    #[arg(
        long,
        default_value = "BALANCED",
        env = "KAFKA_CONSUMER_PRIORITY",
        value_parser = parse_consumer_priority
    )]
    pub consumer_priority: ConsumerPriority,

    /// Schema registry URL; schema-aware formats fail when empty
    #[arg(long, default_value = "", env = "KAFKA_SCHEMA_REGISTRY_URL")]
    pub schema_registry_url: String,

    #[arg(
        long,
        default_value = "USER_INFO",
        env = "KAFKA_SCHEMA_REGISTRY_AUTH_SOURCE",
        value_parser = parse_registry_auth
    )]
    pub schema_registry_auth: SchemaRegistryAuth,

    #[arg(long, default_value = "", env = "KAFKA_SCHEMA_REGISTRY_USERNAME")]
    pub schema_registry_username: String,

    #[arg(
        long,
        default_value = "",
        env = "KAFKA_SCHEMA_REGISTRY_PASSWORD",
        hide_env_values = true
    )]
    pub schema_registry_password: String,

    #[arg(long, default_value_t = 5000, env = "KAFKA_SCHEMA_REGISTRY_TIMEOUT")]
    pub schema_registry_timeout_ms: u64,

    /// Commit offsets every N handled records (manual-commit priorities only)
    #[arg(long, default_value_t = 10, env = "KAFKA_COMMIT_EVERY")]
    pub commit_every: u64,

    /// Bounded wait after each publish
    #[arg(long, default_value_t = 10, env = "KAFKA_FLUSH_TIMEOUT_MS")]
    pub flush_timeout_ms: u64,

    /// Bounded wait of a single consumer poll
    #[arg(long, default_value_t = 100, env = "KAFKA_POLL_TIMEOUT_MS")]
    pub poll_timeout_ms: u64,

    /// Client id reported to the brokers. Defaults to the host name.
    #[arg(long, env = "KAFKA_CLIENT_ID")]
    pub client_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "kafka-toolkit".to_string(),
            auto_offset_reset: None,
            security_protocol: SecurityProtocol::Plaintext,
            sasl_mechanism: SaslMechanism::Plain,
            username: String::new(),
            password: String::new(),
            request_timeout_ms: 5000,
            producer_priority: ProducerPriority::Balanced,
            consumer_priority: ConsumerPriority::Balanced,
            schema_registry_url: String::new(),
            schema_registry_auth: SchemaRegistryAuth::UserInfo,
            schema_registry_username: String::new(),
            schema_registry_password: String::new(),
            schema_registry_timeout_ms: 5000,
            commit_every: 10,
            flush_timeout_ms: 10,
            poll_timeout_ms: 100,
            client_id: None,
        }
    }
}

impl Settings {
    /// Check required fields. Runs before any client is created.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.brokers.trim().is_empty() {
            return Err(ConfigError::Missing("brokers"));
        }
        if self.group_id.trim().is_empty() {
            return Err(ConfigError::Missing("group id"));
        }
        if self.security_protocol.requires_credentials() {
            let protocol = self.security_protocol.as_str();
            if self.username.is_empty() {
                return Err(ConfigError::MissingCredential("username", protocol));
            }
            if self.password.is_empty() {
                return Err(ConfigError::MissingCredential("password", protocol));
            }
        }
        if !self.schema_registry_url.trim().is_empty() {
            let credentials = match self.schema_registry_auth {
                SchemaRegistryAuth::UserInfo => Some([
                    ("schema registry username", &self.schema_registry_username),
                    ("schema registry password", &self.schema_registry_password),
                ]),
                SchemaRegistryAuth::SaslInherit => {
                    Some([("username", &self.username), ("password", &self.password)])
                }
                SchemaRegistryAuth::None => None,
            };
            for (field, value) in credentials.into_iter().flatten() {
                if value.is_empty() {
                    return Err(ConfigError::MissingRegistryCredential(
                        field,
                        self.schema_registry_auth.as_str(),
                    ));
                }
            }
            if self.schema_registry_timeout_ms == 0 {
                return Err(ConfigError::Zero("schema registry timeout"));
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Zero("request timeout"));
        }
        if self.commit_every == 0 {
            return Err(ConfigError::Zero("commit cadence"));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Zero("poll timeout"));
        }
        Ok(())
    }

    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn producer_tuning(&self) -> ProducerTuning {
        self.producer_priority.tuning()
    }

    /// Consumer tuning with the explicit offset reset, if any, applied.
    pub fn consumer_tuning(&self) -> ConsumerTuning {
        self.consumer_priority
            .tuning()
            .with_offset_reset(self.auto_offset_reset)
    }

    /// Connection properties shared by producers and consumers.
    pub fn base_client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("client.id", self.client_id())
            .set("security.protocol", self.security_protocol.as_str())
            .set("socket.timeout.ms", self.request_timeout_ms.to_string());

        if self.security_protocol.uses_sasl() {
            if let Some(mechanism) = self.sasl_mechanism.as_config_value() {
                config.set("sasl.mechanism", mechanism);
            }
            config
                .set("sasl.username", &self.username)
                .set("sasl.password", &self.password);
        }
        config
    }

    pub fn producer_config(&self, tuning: &ProducerTuning) -> ClientConfig {
        let mut config = self.base_client_config();
        for (key, value) in tuning.properties() {
            config.set(key, value);
        }
        config
    }

    pub fn consumer_config(&self, tuning: &ConsumerTuning) -> ClientConfig {
        let mut config = self.base_client_config();
        config
            .set("group.id", &self.group_id)
            .set("enable.partition.eof", "false");
        for (key, value) in tuning.properties() {
            config.set(key, value);
        }
        config
    }

    /// Schema registry client settings, `None` when no URL is configured.
    pub fn schema_registry_config(&self) -> Option<HttpRegistryConfig> {
        if self.schema_registry_url.trim().is_empty() {
            return None;
        }
        let credentials = match self.schema_registry_auth {
            SchemaRegistryAuth::UserInfo => Some((
                self.schema_registry_username.clone(),
                self.schema_registry_password.clone(),
            )),
            SchemaRegistryAuth::SaslInherit => {
                Some((self.username.clone(), self.password.clone()))
            }
            _ => None,
        };
        Some(HttpRegistryConfig {
            url: self.schema_registry_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_millis(self.schema_registry_timeout_ms),
            connect_timeout: Duration::from_millis(5000),
            credentials,
        })
    }
}

fn parse_offset_reset(value: &str) -> Result<AutoOffsetReset, Infallible> {
    Ok(AutoOffsetReset::parse(value))
}

fn parse_security_protocol(value: &str) -> Result<SecurityProtocol, Infallible> {
    Ok(SecurityProtocol::parse(value))
}

fn parse_sasl_mechanism(value: &str) -> Result<SaslMechanism, Infallible> {
    Ok(SaslMechanism::parse(value))
}

fn parse_producer_priority(value: &str) -> Result<ProducerPriority, Infallible> {
    Ok(ProducerPriority::parse(value))
}

fn parse_consumer_priority(value: &str) -> Result<ConsumerPriority, Infallible> {
    Ok(ConsumerPriority::parse(value))
}

fn parse_registry_auth(value: &str) -> Result<SchemaRegistryAuth, Infallible> {
    Ok(SchemaRegistryAuth::parse(value))
}
