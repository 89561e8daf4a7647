//! Message envelope.
//!
//! Every message published or consumed through the toolkit travels inside an
//! [`Envelope`]: a correlation id, the typed payload and a metadata map whose
//! entries become Kafka headers on the wire.

use crate::error::{EnvelopeError, Result};
use std::collections::HashMap;
use uuid::Uuid;

/// Metadata entry that mirrors the envelope's correlation id.
pub const CORRELATION_ID_KEY: &str = "correlationId";

/// Metadata entry that carries the record key. It is never sent as a header.
pub const KEY_METADATA_KEY: &str = "key";

/// Correlation id, payload and metadata of a single message.
///
/// Envelopes are immutable once built. Cloning is the only way to hand one to
/// another task.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    correlation_id: Uuid,
    data: T,
    metadata: HashMap<String, Vec<u8>>,
}

impl<T: Default + PartialEq> Envelope<T> {
    /// Build an outbound envelope.
    ///
    /// Fails with [`EnvelopeError::DataEmpty`] when `data` equals `T::default()`.
    /// The `correlationId` metadata entry is always overwritten with the textual
    /// form of `correlation_id`.
    pub fn new(
        correlation_id: Uuid,
        data: T,
        mut metadata: HashMap<String, Vec<u8>>,
    ) -> Result<Self> {
        if data == T::default() {
            return Err(EnvelopeError::DataEmpty);
        }

        metadata.insert(
            CORRELATION_ID_KEY.to_string(),
            correlation_id.to_string().into_bytes(),
        );

        Ok(Self {
            correlation_id,
            data,
            metadata,
        })
    }

    /// Build an outbound envelope whose record key is `key`.
    pub fn with_key(
        correlation_id: Uuid,
        data: T,
        key: impl Into<String>,
        mut metadata: HashMap<String, Vec<u8>>,
    ) -> Result<Self> {
        metadata.insert(KEY_METADATA_KEY.to_string(), key.into().into_bytes());
        Self::new(correlation_id, data, metadata)
    }
}

impl<T> Envelope<T> {
    /// Build an inbound envelope from a decoded record.
    ///
    /// No emptiness check is made: whatever the broker delivered is handed to
    /// the application. The `correlationId` entry is set to `correlation_id`.
    pub fn from_record(
        correlation_id: Uuid,
        data: T,
        mut metadata: HashMap<String, Vec<u8>>,
    ) -> Self {
        metadata.insert(
            CORRELATION_ID_KEY.to_string(),
            correlation_id.to_string().into_bytes(),
        );
        Self {
            correlation_id,
            data,
            metadata,
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn metadata(&self) -> &HashMap<String, Vec<u8>> {
        &self.metadata
    }

    /// The record key, if one was set.
    pub fn key(&self) -> Option<&[u8]> {
        self.metadata.get(KEY_METADATA_KEY).map(Vec::as_slice)
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn into_parts(self) -> (Uuid, T, HashMap<String, Vec<u8>>) {
        (self.correlation_id, self.data, self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Order {
        id: String,
        quantity: u32,
    }

    fn order() -> Order {
        Order {
            id: "o-1".to_string(),
            quantity: 3,
        }
    }

    #[test]
    fn test_zero_value_payload_is_rejected() {
        let err = Envelope::new(Uuid::new_v4(), Order::default(), HashMap::new()).unwrap_err();
        assert_eq!(err, EnvelopeError::DataEmpty);
        assert_eq!(err.to_string(), "data cannot be empty");
    }

    #[test]
    fn test_correlation_id_round_trips_through_metadata() {
        let id = Uuid::new_v4();
        let envelope = Envelope::new(id, order(), HashMap::new()).unwrap();

        let raw = envelope.metadata().get(CORRELATION_ID_KEY).unwrap();
        let parsed = Uuid::parse_str(std::str::from_utf8(raw).unwrap()).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(envelope.correlation_id(), id);
    }

    #[test]
    fn test_user_metadata_cannot_spoof_correlation_id() {
        let id = Uuid::new_v4();
        let mut metadata = HashMap::new();
        metadata.insert(CORRELATION_ID_KEY.to_string(), b"not-a-uuid".to_vec());
        metadata.insert("source".to_string(), b"billing".to_vec());

        let envelope = Envelope::new(id, order(), metadata).unwrap();
        assert_eq!(
            envelope.metadata()[CORRELATION_ID_KEY],
            id.to_string().into_bytes()
        );
        assert_eq!(envelope.metadata()["source"], b"billing".to_vec());
    }

    #[test]
    fn test_with_key_stores_key_entry() {
        let envelope =
            Envelope::with_key(Uuid::new_v4(), order(), "customer-42", HashMap::new()).unwrap();
        assert_eq!(envelope.key(), Some(&b"customer-42"[..]));
        assert!(envelope.metadata().contains_key(CORRELATION_ID_KEY));
    }

    #[test]
    fn test_with_key_still_rejects_empty_data() {
        let result = Envelope::with_key(Uuid::new_v4(), Order::default(), "k", HashMap::new());
        assert!(matches!(result, Err(EnvelopeError::DataEmpty)));
    }

    #[test]
    fn test_from_record_accepts_default_payload() {
        let id = Uuid::new_v4();
        let envelope = Envelope::from_record(id, Order::default(), HashMap::new());
        assert_eq!(envelope.data(), &Order::default());
        assert_eq!(envelope.key(), None);
        assert_eq!(
            envelope.metadata()[CORRELATION_ID_KEY],
            id.to_string().into_bytes()
        );
    }

    #[test]
    fn test_into_parts() {
        let id = Uuid::new_v4();
        let (cid, data, metadata) = Envelope::new(id, order(), HashMap::new())
            .unwrap()
            .into_parts();
        assert_eq!(cid, id);
        assert_eq!(data, order());
        assert_eq!(metadata.len(), 1);
    }
}
