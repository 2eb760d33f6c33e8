use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use rootsense_ports::NotificationSink;

/// Publishes summaries to an ntfy topic.
#[derive(Debug, Clone)]
pub struct NtfySink {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl NtfySink {
    pub fn new(url: &str, topic: &str) -> Result<Self> {
        let raw = format!("{}/{}", url.trim_end_matches('/'), topic);
        let endpoint = reqwest::Url::parse(&raw)
            .with_context(|| format!("invalid ntfy endpoint `{raw}`"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build ntfy http client")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl NotificationSink for NtfySink {
    fn name(&self) -> &str {
        "ntfy"
    }

    async fn send(&self, subject: &str, html_body: &str) -> Result<()> {
        let endpoint = &self.endpoint;
        self.client
            .post(endpoint.clone())
            .header("Title", subject)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(html_body.to_string())
            .send()
            .await
            .with_context(|| format!("failed to reach {endpoint}"))?
            .error_for_status()
            .with_context(|| format!("{endpoint} rejected the summary"))?;
        tracing::info!(endpoint = %endpoint, "summary published to ntfy");
        Ok(())
    }
}
