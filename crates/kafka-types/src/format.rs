//! Serialization formats and deserialization failure strategies.

use std::fmt;
use std::str::FromStr;

/// Wire encoding of a message value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Plain JSON, no schema registry involvement.
    Json,
    /// JSON body framed with a registered JSON Schema id.
    JsonSchema,
    /// Avro datum framed with a registered Avro schema id.
    Avro,
    /// Protobuf message framed with a registered `.proto` schema id.
    Protobuf,
}

impl Format {
    pub const ALL: [Format; 4] = [
        Format::Json,
        Format::JsonSchema,
        Format::Avro,
        Format::Protobuf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::JsonSchema => "json-schema",
            Format::Avro => "avro",
            Format::Protobuf => "protobuf",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "json" => Ok(Format::Json),
            "json-schema" | "jsonschema" => Ok(Format::JsonSchema),
            "avro" => Ok(Format::Avro),
            "protobuf" | "proto" => Ok(Format::Protobuf),
            other => Err(format!(
                "unknown format '{other}', expected one of: json, json-schema, avro, protobuf"
            )),
        }
    }
}

/// What the consumer does when a record cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureStrategy {
    /// The decode failure ends the consume call with an error.
    StopHost,
    /// The record is logged and dropped; the handler is not invoked.
    #[default]
    IgnoreMessage,
}

impl FromStr for FailureStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "stop-host" | "stophost" => Ok(FailureStrategy::StopHost),
            "ignore-message" | "ignoremessage" | "ignore" => Ok(FailureStrategy::IgnoreMessage),
            other => Err(format!(
                "unknown failure strategy '{other}', expected stop-host or ignore-message"
            )),
        }
    }
}
