//! Kafka toolkit end-to-end tests
//!
//! Every test runs the full client stack (envelopes, codecs, schema registry
//! framing, producer and consumer loop) against the in-process broker and
//! schema registry, so no Kafka cluster is required.

mod failure_strategies;
mod json_roundtrip;
mod protobuf_structural;
mod schema_formats;
mod support;
