use crate::support::Harness;
use kafka_toolkit::engine::{Envelope, FailureStrategy, Format, Payload, CORRELATION_ID_KEY};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Sample {
    #[serde(rename = "Field1")]
    field1: String,
    #[serde(rename = "Field2")]
    field2: i64,
}

impl Payload for Sample {}

fn sample() -> Sample {
    Sample {
        field1: "x".to_string(),
        field2: 1,
    }
}

#[tokio::test]
async fn test_json_envelope_round_trip() {
    let harness = Harness::new();
    let envelope = Envelope::new(Uuid::new_v4(), sample(), HashMap::new()).unwrap();
    harness
        .client
        .publish("t", &envelope, Format::Json)
        .await
        .unwrap();

    let (result, received) = harness
        .collect::<Sample>("t", Format::Json, FailureStrategy::IgnoreMessage, 1)
        .await;
    result.unwrap();

    assert_eq!(received.len(), 1);
    assert_eq!(received[0].data(), &sample());
    let correlation = &received[0].metadata()[CORRELATION_ID_KEY];
    let parsed = Uuid::parse_str(std::str::from_utf8(correlation).unwrap()).unwrap();
    assert_eq!(parsed, envelope.correlation_id());
}

#[tokio::test]
async fn test_wire_record_layout() {
    let harness = Harness::new();
    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), b"billing".to_vec());
    let envelope = Envelope::with_key(Uuid::new_v4(), sample(), "customer-9", metadata).unwrap();
    harness
        .client
        .publish("t", &envelope, Format::Json)
        .await
        .unwrap();

    let records = harness.broker.records("t");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key.as_deref(), Some(&b"customer-9"[..]));
    assert_eq!(
        records[0].payload.as_deref(),
        Some(&br#"{"Field1":"x","Field2":1}"#[..])
    );
    assert!(records[0].headers.iter().all(|(name, _)| name != "key"));
    assert!(records[0]
        .headers
        .iter()
        .any(|(name, value)| name == "source" && value == b"billing"));
}

#[tokio::test]
async fn test_empty_payload_is_rejected_before_publishing() {
    let harness = Harness::new();
    let result = Envelope::new(Uuid::new_v4(), Sample::default(), HashMap::new());
    assert!(result.is_err());
    assert_eq!(harness.broker.send_count(), 0);
}

#[tokio::test]
async fn test_commits_follow_configured_cadence() {
    let harness = Harness::with_settings(kafka_toolkit::engine::Settings {
        poll_timeout_ms: 5,
        commit_every: 4,
        ..Default::default()
    });
    for n in 1..=9 {
        let payload = Sample {
            field1: format!("n{n}"),
            field2: n,
        };
        let envelope = Envelope::new(Uuid::new_v4(), payload, HashMap::new()).unwrap();
        harness
            .client
            .publish("cadence", &envelope, Format::Json)
            .await
            .unwrap();
    }

    let (result, received) = harness
        .collect::<Sample>("cadence", Format::Json, FailureStrategy::IgnoreMessage, 9)
        .await;
    result.unwrap();
    assert_eq!(received.len(), 9);
    assert_eq!(harness.broker.commit_count(), 2);
    assert_eq!(harness.broker.committed_offset("cadence"), Some(8));
}
