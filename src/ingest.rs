//! Inserting externally produced documents: the hook collectors and
//! predictors use to feed the store.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde_json::Value;

use rootsense_domain::{
    Collection, Document, TIMESTAMP_FIELD, format_timestamp, normalize_timestamp,
};
use rootsense_ports::DocumentStore;

pub fn parse_document(raw: &str) -> Result<Document> {
    let value: Value = serde_json::from_str(raw).context("document is not valid JSON")?;
    match value {
        Value::Object(doc) => Ok(doc),
        other => bail!("document must be a JSON object, got {}", kind(&other)),
    }
}

/// Adds a `timestamp` field when the producer did not set one, and rewrites
/// an RFC 3339 one with an offset or a short fraction into fixed-width UTC.
pub fn stamp_timestamp(doc: &mut Document, now: DateTime<Utc>) {
    if !doc.contains_key(TIMESTAMP_FIELD) {
        doc.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::String(format_timestamp(now)),
        );
    } else if !normalize_timestamp(doc) {
        tracing::warn!(timestamp = %doc[TIMESTAMP_FIELD], "timestamp is not RFC 3339");
    }
}

pub async fn insert_document(
    store: &dyn DocumentStore,
    collection: Collection,
    raw: &str,
) -> Result<u64> {
    let mut doc = parse_document(raw)?;
    stamp_timestamp(&mut doc, Utc::now());
    let id = store
        .insert(collection, doc)
        .await
        .with_context(|| format!("failed to insert into {collection}"))?;
    tracing::info!(%collection, id, "document inserted");
    Ok(id)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
