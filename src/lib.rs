//! kafka-toolkit
//!
//! Typed Kafka publishing and consuming with pluggable wire formats.
//!
//! # Features
//!
//! - Envelopes: correlation id, payload and metadata carried as record key and headers
//! - Formats: JSON, JSON Schema, Avro and Protobuf through a Confluent schema registry
//! - Priorities: named profiles that tune producers and consumers for ordering or throughput
//! - Graceful shutdown: Ctrl+C and SIGTERM stop consumers between records
//!
//! # CLI Usage
//!
//! ```bash
//! # Publish a JSON document
//! kafka-toolkit --brokers localhost:9092 publish --topic t --data '{"Field1":"x","Field2":1}'
//!
//! # Consume with a schema registry, stopping on the first undecodable record
//! KAFKA_SCHEMA_REGISTRY_URL=http://localhost:8081 \
//!   kafka-toolkit consume --topic t --format json-schema --strategy stop-host
//! ```

pub mod commands;
pub mod logging;
pub mod shutdown;

// Re-export the engine crates for convenience
pub use kafka_toolkit_engine as engine;
pub use kafka_types as types;

pub use commands::{ConsumeArgs, PublishArgs};
