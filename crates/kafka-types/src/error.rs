//! Error types for kafka-types crate.

use thiserror::Error;

/// Errors that can occur while building an [`Envelope`](crate::Envelope).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("data cannot be empty")]
    DataEmpty,
}

/// Result type alias for kafka-types operations.
pub type Result<T> = std::result::Result<T, EnvelopeError>;
