use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;

use rootsense_ports::NotificationSink;

/// Drops each summary into a directory as a standalone HTML file, for relays
/// that pick mail up from disk.
#[derive(Debug, Clone)]
pub struct OutboxSink {
    dir: PathBuf,
}

impl OutboxSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl NotificationSink for OutboxSink {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn send(&self, subject: &str, html_body: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create outbox {}", self.dir.display()))?;
        let file_name = format!("{}.html", Utc::now().format("%Y%m%dT%H%M%S%.6fZ"));
        let path = self.dir.join(file_name);
        let subject = subject.replace("--", "- -");
        let contents = format!("<!-- Subject: {subject} -->\n{html_body}");
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "summary written to outbox");
        Ok(())
    }
}
