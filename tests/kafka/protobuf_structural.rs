use crate::support::Harness;
use kafka_toolkit::engine::proto::{StructField, SurfaceMember};
use kafka_toolkit::engine::schema_registry::SchemaKind;
use kafka_toolkit::engine::{
    Envelope, FailureStrategy, Format, Payload, ProtoSchema, ProtoView, ProtoViewMut,
    StructuralMessage,
};
use protobuf::reflect::ReflectValueBox;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use uuid::Uuid;

const USER_PROTO: &str = r#"
syntax = "proto3";
package directory;

message User {
    string id = 1;
    string name = 2;
    int32 age = 3;
    bool active = 4;
}
"#;

/// Plain struct mirroring `directory.User`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: String,
    name: String,
    age: i32,
    active: bool,
}

impl StructuralMessage for User {
    fn surface(&self) -> &'static [SurfaceMember] {
        &[
            SurfaceMember::Reset,
            SurfaceMember::Descriptor,
            SurfaceMember::Reflect,
            SurfaceMember::Render,
        ]
    }

    fn fields(&self) -> Vec<StructField> {
        vec![
            StructField::tagged("id", self.id.clone()),
            StructField::tagged("name", self.name.clone()),
            StructField::tagged("age", self.age),
            StructField::tagged("active", self.active),
        ]
    }

    fn set_field(&mut self, name: &str, value: ReflectValueBox) -> bool {
        match (name, value) {
            ("id", ReflectValueBox::String(v)) => self.id = v,
            ("name", ReflectValueBox::String(v)) => self.name = v,
            ("age", ReflectValueBox::I32(v)) => self.age = v,
            ("active", ReflectValueBox::Bool(v)) => self.active = v,
            _ => return false,
        }
        true
    }
}

impl Payload for User {
    fn proto_view(&self) -> ProtoView<'_> {
        ProtoView::Structural(self)
    }

    fn proto_view_mut(&mut self) -> ProtoViewMut<'_> {
        ProtoViewMut::Structural(self)
    }
}

fn user_schema() -> ProtoSchema {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("user.proto");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(USER_PROTO.as_bytes()).unwrap();
    ProtoSchema::from_file(&path).unwrap()
}

#[tokio::test]
async fn test_structural_payload_round_trip() {
    let harness = Harness::new();
    let descriptor = user_schema().message("User").unwrap();
    let example = descriptor.new_instance();
    harness.client.register_proto_type::<User>(example.as_ref());

    let user = User {
        id: "u-1".to_string(),
        name: "Ada".to_string(),
        age: 36,
        active: true,
    };
    let envelope = Envelope::new(Uuid::new_v4(), user.clone(), HashMap::new()).unwrap();
    harness
        .client
        .publish("users", &envelope, Format::Protobuf)
        .await
        .unwrap();

    let versions = harness.registry.versions("users-value").await;
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].kind, SchemaKind::Protobuf);
    assert!(versions[0].definition.contains("package directory;"));
    assert!(versions[0].definition.contains("message User"));

    let (result, received) = harness
        .collect::<User>("users", Format::Protobuf, FailureStrategy::StopHost, 1)
        .await;
    result.unwrap();
    assert_eq!(received[0].data(), &user);
}

#[tokio::test]
async fn test_unregistered_structural_payload_fails_to_publish() {
    let harness = Harness::new();
    let user = User {
        id: "u-2".to_string(),
        ..User::default()
    };
    let envelope = Envelope::new(Uuid::new_v4(), user, HashMap::new()).unwrap();

    let result = harness
        .client
        .publish("users", &envelope, Format::Protobuf)
        .await;
    assert!(result.is_err());
    assert_eq!(harness.broker.send_count(), 0);
}
