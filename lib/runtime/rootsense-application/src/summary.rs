//! HTML performance summary built from the latest record of each feed.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use rootsense_domain::{Collection, Document, visible_fields};
use rootsense_ports::{DocumentStore, NotificationSink};

pub const SCORE_PLACEHOLDER: &str = "N/A";
pub const INSIGHT_PLACEHOLDER: &str = "No insight available";

/// Latest record of each feed; any of them may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryDocument {
    pub generated_at: DateTime<Utc>,
    pub metrics: Option<Document>,
    pub prediction: Option<Document>,
    pub root_cause: Option<Document>,
    pub score: Option<Document>,
}

impl SummaryDocument {
    pub fn render(&self) -> String {
        let mut html = String::new();
        html.push_str("<html>\n<body>\n<h2>Hello Team,</h2>\n");
        let _ = writeln!(
            html,
            "<p>Here is the latest system performance summary as of <strong>{}</strong>:</p>",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        section(&mut html, "System Metrics Summary", |html| {
            list_fields(html, self.metrics.as_ref(), "", "No system metrics available")
        });
        section(&mut html, "Prediction Summary", |html| {
            list_fields(
                html,
                self.prediction.as_ref(),
                "Predicted ",
                "No predictions available",
            )
        });
        section(&mut html, "Root Cause Analysis", |html| {
            list_fields(
                html,
                self.root_cause.as_ref(),
                "",
                "No root cause analysis available",
            )
        });
        section(&mut html, "Resource Efficiency Index (REI) Summary", |html| {
            self.render_score(html)
        });

        html.push_str(
            "<h3>Conclusion:</h3>\n\
             <p>The system is operating based on the analyzed metrics. \
             Please review the insights and take necessary actions if required.</p>\n\
             <p>Best Regards,<br><strong>RootSense Monitoring System</strong></p>\n\
             </body>\n</html>\n",
        );
        html
    }

    fn render_score(&self, html: &mut String) {
        if self.score.is_none() {
            item(html, "No REI data available");
        }
        let score = self.score.as_ref();
        let overall = score
            .and_then(|doc| doc.get("overall_score"))
            .filter(|value| !value.is_null())
            .map(|value| match value {
                Value::Number(_) => format!("{}%", display_value(value)),
                other => display_value(other),
            })
            .unwrap_or_else(|| SCORE_PLACEHOLDER.to_string());
        let insight = score
            .and_then(|doc| doc.get("overall_insight"))
            .filter(|value| !value.is_null())
            .map(display_value)
            .unwrap_or_else(|| INSIGHT_PLACEHOLDER.to_string());
        field(html, "Overall REI", "", &overall);
        field(html, "Insight", "", &insight);
    }
}

/// Renders the four feeds as of now.
pub fn render_summary(
    metrics: Option<&Document>,
    prediction: Option<&Document>,
    root_cause: Option<&Document>,
    score: Option<&Document>,
) -> String {
    SummaryDocument {
        generated_at: Utc::now(),
        metrics: metrics.cloned(),
        prediction: prediction.cloned(),
        root_cause: root_cause.cloned(),
        score: score.cloned(),
    }
    .render()
}

fn section(html: &mut String, title: &str, body: impl FnOnce(&mut String)) {
    let _ = writeln!(html, "<h3>{}</h3>\n<ul>", escape_html(title));
    body(html);
    html.push_str("</ul>\n");
}

fn list_fields(html: &mut String, doc: Option<&Document>, prefix: &str, placeholder: &str) {
    let Some(doc) = doc else {
        item(html, placeholder);
        return;
    };
    let mut any = false;
    for (key, value) in visible_fields(doc) {
        field(html, key, prefix, &display_value(value));
        any = true;
    }
    if !any {
        item(html, placeholder);
    }
}

fn item(html: &mut String, text: &str) {
    let _ = writeln!(html, "<li>{}</li>", escape_html(text));
}

fn field(html: &mut String, key: &str, prefix: &str, value: &str) {
    let _ = writeln!(
        html,
        "<li><strong>{}:</strong> {}{}</li>",
        escape_html(key),
        prefix,
        escape_html(value)
    );
}

/// Plain text for a JSON value: strings unquoted, containers as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Result of handing one summary to every configured sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let failures = self
            .failed
            .iter()
            .map(|(sink, error)| format!("{sink}: {error}"))
            .collect::<Vec<_>>()
            .join("; ");
        bail!("summary delivery failed ({failures})")
    }
}

/// Collects the latest feeds, renders them and dispatches to every sink.
pub struct SummaryNotifier {
    store: Arc<dyn DocumentStore>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    subject: String,
}

impl SummaryNotifier {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sinks: Vec<Arc<dyn NotificationSink>>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sinks,
            subject: subject.into(),
        }
    }

    /// Reads each feed. A failed read is logged and treated as no data.
    pub async fn collect(&self) -> SummaryDocument {
        SummaryDocument {
            generated_at: Utc::now(),
            metrics: self.latest(Collection::SystemStats).await,
            prediction: self.latest(Collection::Predictions).await,
            root_cause: self.latest(Collection::RootCause).await,
            score: self.latest(Collection::Rei).await,
        }
    }

    async fn latest(&self, collection: Collection) -> Option<Document> {
        match self.store.latest(collection).await {
            Ok(doc) => doc,
            Err(err) => {
                warn!(%collection, error = %format!("{err:#}"), "failed to fetch latest record");
                None
            }
        }
    }

    /// Sends to every sink even when an earlier one fails.
    pub async fn run(&self) -> DispatchReport {
        let html = self.collect().await.render();
        let mut report = DispatchReport::default();
        if self.sinks.is_empty() {
            info!(subject = %self.subject, "no notification channels configured");
            return report;
        }
        for sink in &self.sinks {
            match sink.send(&self.subject, &html).await {
                Ok(()) => {
                    info!(sink = sink.name(), "summary sent");
                    report.delivered.push(sink.name().to_string());
                }
                Err(err) => {
                    let error = format!("{err:#}");
                    warn!(sink = sink.name(), error = %error, "failed to send summary");
                    report.failed.push((sink.name().to_string(), error));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rootsense_adapter_storage::InMemoryStore;
    use serde_json::json;
    use std::sync::Mutex;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn empty_summary() -> SummaryDocument {
        SummaryDocument {
            generated_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap(),
            metrics: None,
            prediction: None,
            root_cause: None,
            score: None,
        }
    }

    #[test]
    fn absent_feeds_render_placeholders() {
        let html = empty_summary().render();
        assert!(html.contains("2025-06-01 09:30:00 UTC"));
        assert!(html.contains("<li>No system metrics available</li>"));
        assert!(html.contains("<li>No predictions available</li>"));
        assert!(html.contains("<li>No root cause analysis available</li>"));
        assert!(html.contains("<li>No REI data available</li>"));
        assert!(html.contains("<li><strong>Overall REI:</strong> N/A</li>"));
        assert!(html.contains("<li><strong>Insight:</strong> No insight available</li>"));
    }

    #[test]
    fn fields_keep_natural_order_without_identity() {
        let mut summary = empty_summary();
        summary.metrics = Some(doc(json!({
            "_id": 7,
            "timestamp": "2025-06-01T09:29:00.000000Z",
            "memory_percent": 60,
            "cpu_usage": 45.5,
            "disk_percent": 30
        })));
        let html = summary.render();
        let memory = html.find("memory_percent").unwrap();
        let cpu = html.find("cpu_usage").unwrap();
        let disk = html.find("disk_percent").unwrap();
        assert!(memory < cpu && cpu < disk);
        assert!(!html.contains("_id"));
        assert!(!html.contains("2025-06-01T09:29:00"));
        assert!(html.contains("<li><strong>cpu_usage:</strong> 45.5</li>"));
    }

    #[test]
    fn predictions_are_prefixed_and_nested_values_compact() {
        let mut summary = empty_summary();
        summary.prediction = Some(doc(json!({
            "metric": "cpu_usage",
            "predictions": {"10": 50}
        })));
        let html = summary.render();
        assert!(html.contains("<li><strong>metric:</strong> Predicted cpu_usage</li>"));
        assert!(html.contains(
            "<li><strong>predictions:</strong> Predicted {&quot;10&quot;:50}</li>"
        ));
    }

    #[test]
    fn score_section_renders_only_score_and_insight() {
        let mut summary = empty_summary();
        summary.score = Some(doc(json!({
            "timestamp": "2025-06-01T09:29:00.000000Z",
            "overall_score": 95.0,
            "overall_insight": "operating efficiently, optimal utilization",
            "engine": "v2"
        })));
        let html = summary.render();
        assert!(html.contains("<li><strong>Overall REI:</strong> 95.0%</li>"));
        assert!(html.contains(
            "<li><strong>Insight:</strong> operating efficiently, optimal utilization</li>"
        ));
        assert!(!html.contains("engine"));
        assert!(!html.contains("No REI data available"));
    }

    #[test]
    fn score_record_missing_fields_falls_back() {
        let mut summary = empty_summary();
        summary.score = Some(doc(json!({"timestamp": "2025-06-01T09:29:00.000000Z"})));
        let html = summary.render();
        assert!(html.contains("<li><strong>Overall REI:</strong> N/A</li>"));
        assert!(html.contains("<li><strong>Insight:</strong> No insight available</li>"));
    }

    #[test]
    fn values_are_escaped() {
        let mut summary = empty_summary();
        summary.root_cause = Some(doc(json!({"cause": "<script>alert('x')</script>"})));
        let html = summary.render();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
    }

    #[test]
    fn lists_are_balanced() {
        let html = render_summary(None, None, None, None);
        assert_eq!(html.matches("<ul>").count(), 4);
        assert_eq!(html.matches("</ul>").count(), 4);
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, subject: &str, html_body: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_string(), html_body.to_string()));
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(&self, _: &str, _: &str) -> Result<()> {
            bail!("smtp handshake refused")
        }
    }

    #[tokio::test]
    async fn notifier_sends_latest_feeds() {
        let store = InMemoryStore::new();
        store
            .insert(
                Collection::Rei,
                doc(json!({"timestamp": "2025-06-01T09:00:00.000000Z", "overall_score": 40.0})),
            )
            .await
            .unwrap();
        store
            .insert(
                Collection::Rei,
                doc(json!({"timestamp": "2025-06-01T10:00:00.000000Z", "overall_score": 95.0})),
            )
            .await
            .unwrap();
        let sink = Arc::new(RecordingSink::default());
        let notifier = SummaryNotifier::new(
            Arc::new(store),
            vec![sink.clone() as Arc<dyn NotificationSink>],
            "Summary",
        );

        let report = notifier.run().await;
        assert_eq!(report.delivered, vec!["recording".to_string()]);

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent[0].0, "Summary");
        assert!(sent[0].1.contains("95.0%"));
        assert!(sent[0].1.contains("No system metrics available"));
    }

    #[tokio::test]
    async fn one_failing_sink_does_not_stop_the_others() {
        let sink = Arc::new(RecordingSink::default());
        let notifier = SummaryNotifier::new(
            Arc::new(InMemoryStore::new()),
            vec![Arc::new(FailingSink) as Arc<dyn NotificationSink>, sink.clone()],
            "Summary",
        );

        let report = notifier.run().await;
        assert_eq!(report.delivered, vec!["recording".to_string()]);
        assert_eq!(report.failed[0].0, "failing");
        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("smtp handshake refused"));
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
    }

    struct BrokenStore;

    #[async_trait]
    impl DocumentStore for BrokenStore {
        async fn insert(&self, _: Collection, _: Document) -> Result<u64> {
            bail!("connection refused")
        }

        async fn find_latest(&self, _: Collection, _: &str) -> Result<Option<Document>> {
            bail!("connection refused")
        }

        async fn find_all(&self, _: Collection) -> Result<Vec<Document>> {
            bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn unreadable_store_renders_placeholders() {
        let notifier = SummaryNotifier::new(Arc::new(BrokenStore), Vec::new(), "Summary");
        let summary = notifier.collect().await;
        assert!(summary.metrics.is_none() && summary.score.is_none());
        assert!(notifier.run().await.is_success());
    }
}
