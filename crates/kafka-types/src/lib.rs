//! Shared types for kafka-toolkit.
//!
//! This crate holds the pieces of the toolkit that do not talk to a broker:
//! the message [`Envelope`], the wire [`Format`] and [`FailureStrategy`] enums,
//! connection enums parsed from configuration, and the priority profiles with
//! their transport tuning tables.
//!
//! # Modules
//!
//! - [`envelope`] - correlation id + typed payload + metadata wrapper
//! - [`format`] - serialization formats and deserialization failure strategies
//! - [`priority`] - priority profiles and the tuning bundles they resolve to
//! - [`security`] - security protocol, SASL mechanism, offset reset and registry auth
//! - [`error`] - error types for envelope construction
//!
//! # Example
//!
//! ```ignore
//! use kafka_types::{resolve, ConsumerPriority, Envelope, Role, TuningBundle};
//!
//! let envelope = Envelope::new(uuid::Uuid::new_v4(), order, Default::default())?;
//! let tuning = ConsumerPriority::parse("order").tuning();
//! assert!(matches!(resolve(Role::Producer, "bogus"), TuningBundle::Producer(_)));
//! ```

pub mod envelope;
pub mod error;
pub mod format;
pub mod priority;
pub mod security;

pub use envelope::{Envelope, CORRELATION_ID_KEY, KEY_METADATA_KEY};
pub use error::{EnvelopeError, Result};
pub use format::{FailureStrategy, Format};
pub use priority::{
    resolve, Acks, AutoCommit, Compression, ConsumerPriority, ConsumerTuning, IsolationLevel,
    ProducerPriority, ProducerTuning, Role, TuningBundle,
};
pub use security::{AutoOffsetReset, SaslMechanism, SchemaRegistryAuth, SecurityProtocol};
