use kafka_types::Format;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(#[from] ConfigError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Schema registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to deserialize record {topic}[{partition}]@{offset}: {source}")]
    Deserialization {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: CodecError,
    },

    #[error("Consumer for topic '{0}' is already polling")]
    ConsumerBusy(String),

    #[error("Instance cached for topic '{0}' has an unexpected type")]
    InstanceTypeMismatch(String),

    #[error("Protobuf parse error: {0}")]
    ProtobufParse(String),

    #[error("Message type not found: {0}")]
    MessageTypeNotFound(String),
}

/// Configuration problems detected by [`Settings::validate`](crate::Settings::validate).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{0} is required when the security protocol is {1}")]
    MissingCredential(&'static str, &'static str),

    #[error("{0} is required when the schema registry auth source is {1}")]
    MissingRegistryCredential(&'static str, &'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("No codec bound for format {0}")]
    Unbound(Format),

    #[error("{format} codec failed: {message}")]
    Failure { format: Format, message: String },

    #[error("Protobuf adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Schema registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl CodecError {
    pub(crate) fn failure(format: Format, message: impl std::fmt::Display) -> Self {
        CodecError::Failure {
            format,
            message: message.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("{0} cannot be adapted to a protobuf message")]
    NotAdaptable(String),

    #[error("decode source is not a native protobuf message")]
    NotCompatibleSource,

    #[error("decode target {0} is not writable")]
    NotWritableTarget(String),

    #[error("no registered or detectable protobuf type for {0}")]
    NoRegisteredOrDetectableType(String),

    #[error("{0}")]
    Failure(String),
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("No offset to commit")]
    NoOffset,

    #[error("{message}")]
    Transport { message: String, fatal: bool },
}

impl BrokerError {
    /// Whether the client instance that produced this error is unusable.
    pub fn is_fatal(&self) -> bool {
        match self {
            BrokerError::Kafka(KafkaError::MessageConsumptionFatal(_)) => true,
            BrokerError::Kafka(e) => e.rdkafka_error_code() == Some(RDKafkaErrorCode::Fatal),
            BrokerError::NoOffset => false,
            BrokerError::Transport { fatal, .. } => *fatal,
        }
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Schema registry returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Schema id {0} not found")]
    SchemaNotFound(u32),

    #[error("Subject '{0}' has no matching schema")]
    SubjectNotFound(String),

    #[error("Schema registry URL is not configured")]
    NotConfigured,

    #[error("Invalid schema registry URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, Error>;
