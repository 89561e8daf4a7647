use crate::support::Harness;
use kafka_toolkit::engine::schema_registry::{SchemaKind, SchemaRegistry};
use kafka_toolkit::engine::{Envelope, FailureStrategy, Format, Payload};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

const ORDER_AVRO: &str = r#"{
    "type": "record",
    "name": "Order",
    "namespace": "shop",
    "fields": [
        {"name": "id", "type": "string"},
        {"name": "quantity", "type": "long"},
        {"name": "express", "type": "boolean"}
    ]
}"#;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: String,
    quantity: i64,
    express: bool,
}

impl Payload for Order {
    fn avro_schema() -> Option<&'static str> {
        Some(ORDER_AVRO)
    }
}

fn order(n: i64) -> Order {
    Order {
        id: format!("o-{n}"),
        quantity: n,
        express: n % 2 == 0,
    }
}

async fn publish_orders(harness: &Harness, topic: &str, format: Format, count: i64) {
    for n in 1..=count {
        let envelope = Envelope::new(Uuid::new_v4(), order(n), HashMap::new()).unwrap();
        harness
            .client
            .publish(topic, &envelope, format)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_avro_round_trip_registers_schema_once() {
    let harness = Harness::new();
    publish_orders(&harness, "orders", Format::Avro, 3).await;

    assert_eq!(harness.registry.register_calls(), 1);
    let versions = harness.registry.versions("orders-value").await;
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].kind, SchemaKind::Avro);

    let (result, received) = harness
        .collect::<Order>("orders", Format::Avro, FailureStrategy::StopHost, 3)
        .await;
    result.unwrap();
    let data: Vec<Order> = received.iter().map(|e| e.data().clone()).collect();
    assert_eq!(data, vec![order(1), order(2), order(3)]);
}

#[tokio::test]
async fn test_json_schema_round_trip() {
    let harness = Harness::new();
    publish_orders(&harness, "orders-json", Format::JsonSchema, 2).await;

    let record = &harness.broker.records("orders-json")[0];
    let payload = record.payload.as_deref().unwrap();
    assert_eq!(payload[0], 0);
    let id = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
    let schema = harness.registry.schema_by_id(id).await.unwrap();
    assert_eq!(schema.kind, SchemaKind::Json);

    let (result, received) = harness
        .collect::<Order>("orders-json", Format::JsonSchema, FailureStrategy::StopHost, 2)
        .await;
    result.unwrap();
    assert_eq!(received[1].data(), &order(2));
}

#[tokio::test]
async fn test_format_mismatch_is_a_decode_failure() {
    let harness = Harness::new();
    publish_orders(&harness, "mixed", Format::Avro, 1).await;

    let (result, received) = harness
        .collect::<Order>("mixed", Format::JsonSchema, FailureStrategy::StopHost, 1)
        .await;
    assert!(result.is_err());
    assert!(received.is_empty());
}
