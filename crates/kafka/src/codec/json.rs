use super::{Codec, Payload};
use crate::error::CodecError;
use async_trait::async_trait;
use kafka_types::Format;

/// Plain JSON, no schema registry involved.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

#[async_trait]
impl<T: Payload> Codec<T> for JsonCodec {
    fn format(&self) -> Format {
        Format::Json
    }

    async fn encode(&self, _topic: &str, payload: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(payload).map_err(|e| CodecError::failure(Format::Json, e))
    }

    async fn decode(&self, _topic: &str, bytes: &[u8], target: &mut T) -> Result<(), CodecError> {
        *target =
            serde_json::from_slice(bytes).map_err(|e| CodecError::failure(Format::Json, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(rename = "Field1")]
        field1: String,
        #[serde(rename = "Field2")]
        field2: i64,
    }

    impl Payload for Sample {}

    #[tokio::test]
    async fn test_encodes_plain_json() {
        let sample = Sample {
            field1: "x".to_string(),
            field2: 1,
        };
        let bytes = Codec::<Sample>::encode(&JsonCodec, "t", &sample)
            .await
            .unwrap();
        assert_eq!(bytes, br#"{"Field1":"x","Field2":1}"#);

        let mut decoded = Sample::default();
        Codec::<Sample>::decode(&JsonCodec, "t", &bytes, &mut decoded)
            .await
            .unwrap();
        assert_eq!(decoded, sample);
    }

    #[tokio::test]
    async fn test_invalid_json_is_a_codec_failure() {
        let mut target = Sample::default();
        let result = Codec::<Sample>::decode(&JsonCodec, "t", b"{not json", &mut target).await;
        assert!(matches!(
            result,
            Err(CodecError::Failure {
                format: Format::Json,
                ..
            })
        ));
    }
}
