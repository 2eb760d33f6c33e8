use anyhow::Result;
use async_trait::async_trait;

use rootsense_ports::NotificationSink;

/// Writes summaries to the tracing output instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, subject: &str, html_body: &str) -> Result<()> {
        tracing::info!(subject, bytes = html_body.len(), "summary ready");
        tracing::debug!(body = html_body, "summary body");
        Ok(())
    }
}
