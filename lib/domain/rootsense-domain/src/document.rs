//! Schemaless documents and the collections that hold them.
//!
//! Every record in the shared store is an ordered JSON object. Field order is
//! the order the producer wrote them in, and readers such as the summary
//! formatter rely on it.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An ordered mapping of field name to value.
pub type Document = Map<String, Value>;

/// Store-assigned insertion sequence number.
pub const ID_FIELD: &str = "_id";
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Fields that identify a document rather than describe it.
pub const EXCLUDED_FIELDS: [&str; 2] = [ID_FIELD, TIMESTAMP_FIELD];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    SystemStats,
    Predictions,
    RootCause,
    Rei,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::SystemStats,
        Collection::Predictions,
        Collection::RootCause,
        Collection::Rei,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::SystemStats => "system_stats",
            Collection::Predictions => "predictions",
            Collection::RootCause => "root_cause",
            Collection::Rei => "rei",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "system_stats" | "metrics" => Ok(Collection::SystemStats),
            "predictions" => Ok(Collection::Predictions),
            "root_cause" => Ok(Collection::RootCause),
            "rei" | "scores" => Ok(Collection::Rei),
            other => anyhow::bail!("unknown collection: {other}"),
        }
    }
}

/// Fixed-width RFC 3339 rendering, so lexical order matches chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Rewrites an RFC 3339 `timestamp` field into [`format_timestamp`] form.
///
/// Offsets are converted to UTC. Returns `false` when the field is present
/// but is not an RFC 3339 string; the document is then left unchanged.
pub fn normalize_timestamp(doc: &mut Document) -> bool {
    let Some(value) = doc.get_mut(TIMESTAMP_FIELD) else {
        return true;
    };
    let Some(parsed) = value
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
    else {
        return false;
    };
    *value = Value::String(format_timestamp(parsed.with_timezone(&Utc)));
    true
}

/// Fields of `doc` in their natural order, minus [`EXCLUDED_FIELDS`].
pub fn visible_fields(doc: &Document) -> impl Iterator<Item = (&String, &Value)> {
    doc.iter()
        .filter(|(key, _)| !EXCLUDED_FIELDS.contains(&key.as_str()))
}

/// Orders two sort keys for "latest" lookups. A missing key ranks lowest.
///
/// Numbers compare numerically and strings lexically. Values of different JSON
/// types are ordered by type (null, bool, number, string, array, object).
pub fn compare_sort_keys(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
