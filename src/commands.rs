//! `publish` and `consume` subcommands over dynamic JSON payloads.

use anyhow::Context;
use clap::Args;
use kafka_toolkit_engine::{Client, Envelope, FailureStrategy, Format};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Args, Debug, Clone)]
pub struct PublishArgs {
    /// Destination topic
    #[arg(long)]
    pub topic: String,

    /// Wire format: json or json-schema
    #[arg(long, default_value = "json", value_parser = parse_format)]
    pub format: Format,

    /// Payload as a JSON document
    #[arg(long)]
    pub data: String,

    /// Record key. Defaults to the correlation id.
    #[arg(long)]
    pub key: Option<String>,

    /// Extra header, repeatable
    #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone)]
pub struct ConsumeArgs {
    /// Source topic
    #[arg(long)]
    pub topic: String,

    /// Wire format: json or json-schema
    #[arg(long, default_value = "json", value_parser = parse_format)]
    pub format: Format,

    /// What to do with records that fail to decode: ignore-message or stop-host
    #[arg(long, default_value = "ignore-message")]
    pub strategy: FailureStrategy,

    /// Stop after this many records
    #[arg(long)]
    pub max_messages: Option<usize>,
}

/// Formats usable with untyped JSON documents. Avro and Protobuf need a
/// payload type that carries its own schema.
fn parse_format(value: &str) -> Result<Format, String> {
    match value.parse::<Format>()? {
        format @ (Format::Json | Format::JsonSchema) => Ok(format),
        format => Err(format!(
            "{format} needs a typed payload; the command line supports json and json-schema"
        )),
    }
}

fn parse_header(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, header)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), header.to_string()))
        }
        _ => Err(format!("invalid header '{value}', expected NAME=VALUE")),
    }
}

/// Publish one envelope and return its correlation id.
pub async fn publish(client: &Client, args: PublishArgs) -> anyhow::Result<Uuid> {
    let data: Value = serde_json::from_str(&args.data).context("--data is not valid JSON")?;
    let metadata: HashMap<String, Vec<u8>> = args
        .headers
        .into_iter()
        .map(|(name, value)| (name, value.into_bytes()))
        .collect();

    let correlation_id = Uuid::new_v4();
    let envelope = match args.key {
        Some(key) => Envelope::with_key(correlation_id, data, key, metadata)?,
        None => Envelope::new(correlation_id, data, metadata)?,
    };
    client
        .publish(&args.topic, &envelope, args.format)
        .await
        .with_context(|| format!("Failed to publish to {}", args.topic))?;

    info!("Published {correlation_id} to {}", args.topic);
    Ok(correlation_id)
}

/// Print each consumed envelope as one JSON line until cancelled or
/// `max_messages` were seen. Returns the number of records handled.
pub async fn consume(client: &Client, args: ConsumeArgs) -> anyhow::Result<usize> {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let cancel = client.cancellation_token();
    let max_messages = args.max_messages;

    client
        .consume::<Value, _, _>(&args.topic, args.format, args.strategy, move |envelope| {
            println!("{}", render(&envelope));
            let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if max_messages.is_some_and(|max| count >= max) {
                cancel.cancel();
            }
            async { anyhow::Ok(()) }
        })
        .await
        .with_context(|| format!("Consumer on {} failed", args.topic))?;

    Ok(seen.load(Ordering::SeqCst))
}

fn render(envelope: &Envelope<Value>) -> Value {
    let metadata: serde_json::Map<String, Value> = envelope
        .metadata()
        .iter()
        .map(|(name, value)| (name.clone(), json!(String::from_utf8_lossy(value))))
        .collect();
    json!({
        "correlationId": envelope.correlation_id().to_string(),
        "metadata": metadata,
        "data": envelope.data(),
    })
}
