use crate::support::Harness;
use kafka_toolkit::engine::broker::OutboundRecord;
use kafka_toolkit::engine::{Error, FailureStrategy, Format};
use serde_json::{json, Value};

fn raw(harness: &Harness, topic: &str, payload: &[u8]) {
    harness.broker.append(OutboundRecord {
        topic: topic.to_string(),
        key: None,
        headers: vec![],
        payload: payload.to_vec(),
    });
}

#[tokio::test]
async fn test_ignore_message_drops_undecodable_records() {
    let harness = Harness::new();
    raw(&harness, "events", b"not json");
    raw(&harness, "events", br#"{"ok":true}"#);

    let (result, received) = harness
        .collect::<Value>("events", Format::Json, FailureStrategy::IgnoreMessage, 1)
        .await;
    result.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].data(), &json!({"ok": true}));
}

#[tokio::test]
async fn test_stop_host_ends_the_consumer() {
    let harness = Harness::new();
    raw(&harness, "events", br#"{"ok":true}"#);
    raw(&harness, "events", b"not json");
    raw(&harness, "events", br#"{"ok":false}"#);

    let (result, received) = harness
        .collect::<Value>("events", Format::Json, FailureStrategy::StopHost, 3)
        .await;
    match result {
        Err(Error::Deserialization { topic, offset, .. }) => {
            assert_eq!(topic, "events");
            assert_eq!(offset, 1);
        }
        other => panic!("expected a deserialization failure, got {other:?}"),
    }
    assert_eq!(received.len(), 1);
}

#[tokio::test]
async fn test_framed_payload_with_unknown_schema_is_a_decode_failure() {
    let harness = Harness::new();
    raw(&harness, "events", &[0, 0, 0, 0, 42, b'{', b'}']);

    let (result, received) = harness
        .collect::<Value>("events", Format::JsonSchema, FailureStrategy::StopHost, 1)
        .await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
    assert!(received.is_empty());
}
