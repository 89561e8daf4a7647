//! Typed Kafka publish/subscribe engine.
//!
//! Features:
//!
//! - Envelopes: correlation id, typed payload and metadata mapped to Kafka keys and headers
//! - Priority profiles: ordering vs throughput intents resolved into librdkafka tuning
//! - Formats: JSON, JSON Schema, Avro and Protobuf with Confluent schema registry framing
//! - Protobuf adapter: encode plain structs that mirror a registered protobuf message
//! - Singleton instances: one producer and one consumer per payload type and topic
//! - Poll loop: cancellable consume loop with batched commits and per-record failure strategies

/// Client facade tying settings, broker, schema registry and instance caches together
pub mod client;

/// Typed consumer running the subscribe / poll / handle / commit loop
pub mod consumer;

/// Typed producer publishing envelopes
pub mod producer;

/// Producer and consumer singletons per payload type and topic
pub mod registry;

/// Broker seam with rdkafka-backed and in-memory implementations
pub mod broker;

/// Per-format payload encoding
pub mod codec;
pub mod config;
pub mod error;
pub mod proto;
pub mod schema_registry;

pub use client::Client;
pub use codec::{Codec, CodecTable, Payload};
pub use config::Settings;
pub use consumer::{correlation_from_headers, Consumer};
pub use error::{Error, Result};
pub use producer::Producer;
pub use proto::{ProtoAdapter, ProtoSchema, ProtoView, ProtoViewMut, StructuralMessage, TypeKey};
pub use registry::InstanceRegistry;

pub use kafka_types::{
    ConsumerPriority, Envelope, FailureStrategy, Format, ProducerPriority, CORRELATION_ID_KEY,
    KEY_METADATA_KEY,
};
