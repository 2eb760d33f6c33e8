//! Resource Efficiency Index.
//!
//! A metric's ratio is `actual / predicted * 100`, rounded to two decimals.
//! The overall score is the mean of every ratio that could be computed,
//! classified into an [`Insight`] band. Metrics without a usable prediction
//! are skipped and logged; they never count as zero.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use rootsense_domain::{
    Collection, DEFAULT_TRACKED_METRICS, Insight, MetricSample, PredictionRecord, ReiConfig,
    SampleWindow, ScoreRecord,
};
use rootsense_ports::DocumentStore;

/// Ratio of actual to predicted usage as a percentage, rounded to two decimal
/// places. `None` when the prediction is not positive.
pub fn metric_ratio(actual: f64, predicted: f64) -> Option<f64> {
    if predicted > 0.0 {
        Some(round2(actual / predicted * 100.0))
    } else {
        None
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRatio {
    pub metric: String,
    pub actual: f64,
    pub predicted: f64,
    pub ratio: f64,
}

impl MetricRatio {
    pub fn insight(&self) -> Insight {
        Insight::classify(self.ratio)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingPrediction,
    MissingHorizon(String),
    NonPositivePrediction(f64),
    NonNumericActual,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingPrediction => f.write_str("no prediction record"),
            SkipReason::MissingHorizon(horizon) => {
                write!(f, "no numeric prediction at horizon {horizon}")
            }
            SkipReason::NonPositivePrediction(value) => {
                write!(f, "predicted value {value} is not positive")
            }
            SkipReason::NonNumericActual => f.write_str("actual value is not numeric"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedMetric {
    pub metric: String,
    pub reason: SkipReason,
}

/// Per-metric results of one scoring pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReiComputation {
    pub ratios: Vec<MetricRatio>,
    pub skipped: Vec<SkippedMetric>,
}

impl ReiComputation {
    /// Mean of all computed ratios, `None` when there are none.
    pub fn overall_score(&self) -> Option<f64> {
        if self.ratios.is_empty() {
            return None;
        }
        let sum: f64 = self.ratios.iter().map(|r| r.ratio).sum();
        Some(sum / self.ratios.len() as f64)
    }

    pub fn score_record(&self, timestamp: DateTime<Utc>) -> Option<ScoreRecord> {
        self.overall_score()
            .map(|score| ScoreRecord::new(timestamp, score))
    }
}

/// Scores every sample against `predictions`.
///
/// Only fields named in `tracked` are considered. For each one the first
/// prediction record with a matching `metric` is used, so callers that want
/// the freshest forecast pass records newest-first.
pub fn score_samples(
    samples: &[MetricSample],
    predictions: &[PredictionRecord],
    horizon: &str,
    tracked: &[String],
) -> ReiComputation {
    let mut computation = ReiComputation::default();
    for sample in samples {
        for (metric, actual) in &sample.fields {
            if !tracked.iter().any(|name| name == metric) {
                continue;
            }
            match score_metric(actual, metric, predictions, horizon) {
                Ok(ratio) => computation.ratios.push(ratio),
                Err(reason) => computation.skipped.push(SkippedMetric {
                    metric: metric.clone(),
                    reason,
                }),
            }
        }
    }
    computation
}

fn score_metric(
    actual: &Value,
    metric: &str,
    predictions: &[PredictionRecord],
    horizon: &str,
) -> Result<MetricRatio, SkipReason> {
    let record = predictions
        .iter()
        .find(|record| record.metric == metric)
        .ok_or(SkipReason::MissingPrediction)?;
    let predicted = record
        .predicted(horizon)
        .ok_or_else(|| SkipReason::MissingHorizon(horizon.to_string()))?;
    let actual = actual.as_f64().ok_or(SkipReason::NonNumericActual)?;
    let ratio =
        metric_ratio(actual, predicted).ok_or(SkipReason::NonPositivePrediction(predicted))?;
    Ok(MetricRatio {
        metric: metric.to_string(),
        actual,
        predicted,
        ratio,
    })
}

/// Scores one sample over the default tracked metrics, stamped now.
pub fn compute_rei(
    actual: &MetricSample,
    predictions: &[PredictionRecord],
    horizon: &str,
) -> Option<ScoreRecord> {
    let tracked: Vec<String> = DEFAULT_TRACKED_METRICS
        .iter()
        .map(|name| name.to_string())
        .collect();
    score_samples(std::slice::from_ref(actual), predictions, horizon, &tracked)
        .score_record(Utc::now())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReiOutcome {
    Persisted {
        record: ScoreRecord,
        computation: ReiComputation,
    },
    InsufficientData {
        computation: ReiComputation,
    },
}

/// Reads samples and forecasts from the store and persists one score.
pub struct ReiEngine {
    store: Arc<dyn DocumentStore>,
    config: ReiConfig,
}

impl ReiEngine {
    pub fn new(store: Arc<dyn DocumentStore>, config: ReiConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(&self) -> Result<ReiOutcome> {
        info!(horizon = %self.config.horizon, "starting REI calculation");
        let samples = self.load_samples().await?;
        let predictions = self.load_predictions().await?;

        let computation = score_samples(
            &samples,
            &predictions,
            &self.config.horizon,
            &self.config.tracked_metrics,
        );
        for skipped in &computation.skipped {
            warn!(metric = %skipped.metric, reason = %skipped.reason, "skipping metric");
        }
        for ratio in &computation.ratios {
            info!(
                metric = %ratio.metric,
                actual = ratio.actual,
                predicted = ratio.predicted,
                rei = ratio.ratio,
                insight = %ratio.insight(),
                "metric scored"
            );
        }

        let Some(record) = computation.score_record(Utc::now()) else {
            info!(
                samples = samples.len(),
                predictions = predictions.len(),
                "insufficient data for REI"
            );
            return Ok(ReiOutcome::InsufficientData { computation });
        };

        self.store
            .insert(Collection::Rei, record.to_document())
            .await
            .context("failed to save REI score")?;
        info!(
            score = record.overall_score,
            insight = %record.overall_insight,
            "overall REI saved"
        );
        Ok(ReiOutcome::Persisted {
            record,
            computation,
        })
    }

    async fn load_samples(&self) -> Result<Vec<MetricSample>> {
        let docs = match self.config.sample_window {
            SampleWindow::Latest => self
                .store
                .latest(Collection::SystemStats)
                .await
                .context("failed to fetch latest metrics")?
                .into_iter()
                .collect(),
            SampleWindow::All => self
                .store
                .find_all(Collection::SystemStats)
                .await
                .context("failed to fetch metrics")?,
        };
        Ok(docs.iter().map(MetricSample::from_document).collect())
    }

    /// Prediction records, newest first. Equal timestamps keep the later
    /// insert first; unstamped records go last.
    async fn load_predictions(&self) -> Result<Vec<PredictionRecord>> {
        let docs = self
            .store
            .find_all(Collection::Predictions)
            .await
            .context("failed to fetch predictions")?;
        let mut records: Vec<PredictionRecord> = docs
            .iter()
            .rev()
            .filter_map(|doc| match PredictionRecord::from_document(doc) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(error = %err, "ignoring malformed prediction record");
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }
}
