//! Notification sink adapters.

pub mod log;
pub mod ntfy;
pub mod outbox;

use std::sync::Arc;

use anyhow::Result;

use rootsense_domain::{NotificationChannelConfig, NotificationConfig};
use rootsense_ports::NotificationSink;

pub use log::LogSink;
pub use ntfy::NtfySink;
pub use outbox::OutboxSink;

pub fn build_sinks(config: &NotificationConfig) -> Result<Vec<Arc<dyn NotificationSink>>> {
    config
        .channels
        .iter()
        .map(|channel| -> Result<Arc<dyn NotificationSink>> {
            Ok(match channel {
                NotificationChannelConfig::Ntfy { url, topic } => Arc::new(NtfySink::new(url, topic)?),
                NotificationChannelConfig::Outbox { dir } => Arc::new(OutboxSink::new(dir.clone())),
                NotificationChannelConfig::Log => Arc::new(LogSink),
            })
        })
        .collect()
}
