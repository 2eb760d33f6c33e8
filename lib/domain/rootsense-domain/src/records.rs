//! Typed views over the documents each pipeline stage writes.

use chrono::{DateTime, Utc};
use serde_json::{Number, Value};
use thiserror::Error;

use crate::document::{Document, TIMESTAMP_FIELD, format_timestamp, visible_fields};
use crate::insight::Insight;

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// One collector reading: named values captured at a single instant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricSample {
    pub timestamp: Option<DateTime<Utc>>,
    pub fields: Document,
}

impl MetricSample {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            fields: Document::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fields.insert(name.into(), number(value));
        self
    }

    /// Lenient view: any object is a sample, fields keep their order.
    pub fn from_document(doc: &Document) -> Self {
        Self {
            timestamp: parse_timestamp(doc),
            fields: visible_fields(doc)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        if let Some(ts) = self.timestamp {
            doc.insert(TIMESTAMP_FIELD.into(), Value::String(format_timestamp(ts)));
        }
        for (key, value) in &self.fields {
            doc.insert(key.clone(), value.clone());
        }
        doc
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }
}

/// Forecast for one metric, keyed by horizon label (minutes ahead).
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub metric: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub predictions: Document,
}

impl PredictionRecord {
    pub fn new(metric: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            metric: metric.into(),
            timestamp: Some(timestamp),
            predictions: Document::new(),
        }
    }

    pub fn with_prediction(mut self, horizon: impl Into<String>, value: f64) -> Self {
        self.predictions.insert(horizon.into(), number(value));
        self
    }

    pub fn from_document(doc: &Document) -> Result<Self, RecordError> {
        let metric = match doc.get("metric") {
            Some(Value::String(metric)) => metric.clone(),
            Some(_) => {
                return Err(RecordError::InvalidField {
                    field: "metric",
                    expected: "a string",
                });
            }
            None => return Err(RecordError::MissingField("metric")),
        };
        let predictions = match doc.get("predictions") {
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(RecordError::InvalidField {
                    field: "predictions",
                    expected: "an object keyed by horizon",
                });
            }
            None => Document::new(),
        };
        Ok(Self {
            metric,
            timestamp: parse_timestamp(doc),
            predictions,
        })
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("metric".into(), Value::String(self.metric.clone()));
        if let Some(ts) = self.timestamp {
            doc.insert(TIMESTAMP_FIELD.into(), Value::String(format_timestamp(ts)));
        }
        doc.insert("predictions".into(), Value::Object(self.predictions.clone()));
        doc
    }

    /// Predicted value at `horizon`, if present and numeric.
    pub fn predicted(&self, horizon: &str) -> Option<f64> {
        self.predictions.get(horizon).and_then(Value::as_f64)
    }
}

/// Persisted outcome of one REI run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub timestamp: DateTime<Utc>,
    pub overall_score: f64,
    pub overall_insight: Insight,
}

impl ScoreRecord {
    pub fn new(timestamp: DateTime<Utc>, overall_score: f64) -> Self {
        Self {
            timestamp,
            overall_score,
            overall_insight: Insight::classify(overall_score),
        }
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(
            TIMESTAMP_FIELD.into(),
            Value::String(format_timestamp(self.timestamp)),
        );
        doc.insert("overall_score".into(), number(self.overall_score));
        doc.insert(
            "overall_insight".into(),
            Value::String(self.overall_insight.label().to_string()),
        );
        doc
    }

    pub fn from_document(doc: &Document) -> Result<Self, RecordError> {
        let timestamp = parse_timestamp(doc).ok_or(RecordError::MissingField(TIMESTAMP_FIELD))?;
        let overall_score = doc
            .get("overall_score")
            .ok_or(RecordError::MissingField("overall_score"))?
            .as_f64()
            .ok_or(RecordError::InvalidField {
                field: "overall_score",
                expected: "a number",
            })?;
        let overall_insight = doc
            .get("overall_insight")
            .and_then(Value::as_str)
            .and_then(Insight::from_label)
            .ok_or(RecordError::InvalidField {
                field: "overall_insight",
                expected: "a known insight label",
            })?;
        Ok(Self {
            timestamp,
            overall_score,
            overall_insight,
        })
    }
}

fn parse_timestamp(doc: &Document) -> Option<DateTime<Utc>> {
    doc.get(TIMESTAMP_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

fn number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}
