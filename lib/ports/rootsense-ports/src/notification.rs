use anyhow::Result;
use async_trait::async_trait;

/// Destination for rendered summaries. Transport settings are injected at
/// construction.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, subject: &str, html_body: &str) -> Result<()>;
}
