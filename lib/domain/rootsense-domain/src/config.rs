//! Pipeline configuration, loaded from YAML.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Program placeholder resolved to the running executable at wiring time.
pub const SELF_PROGRAM: &str = "@self";

pub const DEFAULT_HORIZON: &str = "10";
pub const DEFAULT_TRACKED_METRICS: [&str; 3] = ["cpu_usage", "memory_percent", "disk_percent"];
pub const DEFAULT_SUBJECT: &str = "RootSense: System Performance Summary";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker name must not be empty")]
    EmptyWorkerName,
    #[error("worker `{0}` is configured more than once")]
    DuplicateWorker(String),
    #[error("worker `{0}` has no program")]
    EmptyProgram(String),
    #[error("service `{0}` must bind a non-zero port")]
    ZeroPort(String),
    #[error("services `{first}` and `{second}` both bind port {port}")]
    DuplicatePort {
        port: u16,
        first: String,
        second: String,
    },
    #[error("rei horizon label must not be empty")]
    EmptyHorizon,
    #[error("rei needs at least one tracked metric")]
    NoTrackedMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootsenseConfig {
    pub store: StoreConfig,
    pub rei: ReiConfig,
    pub notification: NotificationConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

impl RootsenseConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("invalid config at {}", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw).context("failed to parse config yaml")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the orchestrator cannot launch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rei.validate()?;
        self.pipeline.validate()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub sqlite_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            sqlite_path: PathBuf::from("rootsense.db"),
        }
    }
}

/// Which metric samples a REI run scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleWindow {
    #[default]
    Latest,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReiConfig {
    pub horizon: String,
    pub tracked_metrics: Vec<String>,
    pub sample_window: SampleWindow,
}

impl Default for ReiConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON.to_string(),
            tracked_metrics: DEFAULT_TRACKED_METRICS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            sample_window: SampleWindow::Latest,
        }
    }
}

impl ReiConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon.trim().is_empty() {
            return Err(ConfigError::EmptyHorizon);
        }
        if self.tracked_metrics.iter().all(|name| name.trim().is_empty()) {
            return Err(ConfigError::NoTrackedMetrics);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationChannelConfig {
    Ntfy { url: String, topic: String },
    Outbox { dir: PathBuf },
    Log,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub subject: String,
    pub channels: Vec<NotificationChannelConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            channels: vec![NotificationChannelConfig::Log],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedWorkerConfig {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceWorkerConfig {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub stagger_ms: u64,
    pub bounded: Vec<BoundedWorkerConfig>,
    pub services: Vec<ServiceWorkerConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let worker = |name: &str| BoundedWorkerConfig {
            name: name.to_string(),
            program: SELF_PROGRAM.to_string(),
            args: vec![name.to_string()],
            env: BTreeMap::new(),
        };
        Self {
            stagger_ms: 3_000,
            bounded: vec![worker("rei"), worker("notify")],
            services: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        let workers = self
            .bounded
            .iter()
            .map(|w| (&w.name, &w.program))
            .chain(self.services.iter().map(|s| (&s.name, &s.program)));
        for (name, program) in workers {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyWorkerName);
            }
            if !names.insert(name.as_str()) {
                return Err(ConfigError::DuplicateWorker(name.clone()));
            }
            if program.trim().is_empty() {
                return Err(ConfigError::EmptyProgram(name.clone()));
            }
        }

        let mut ports: HashMap<u16, &str> = HashMap::new();
        for service in &self.services {
            if service.port == 0 {
                return Err(ConfigError::ZeroPort(service.name.clone()));
            }
            if let Some(first) = ports.insert(service.port, &service.name) {
                return Err(ConfigError::DuplicatePort {
                    port: service.port,
                    first: first.to_string(),
                    second: service.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
store:
  backend: sqlite
  sqlite_path: /var/lib/rootsense/rootsense.db
rei:
  horizon: "30"
notification:
  subject: Nightly summary
  channels:
    - type: ntfy
      url: https://ntfy.sh
      topic: ops
    - type: outbox
      dir: /tmp/outbox
pipeline:
  stagger_ms: 250
  bounded:
    - name: collector
      program: python
      args: [osinfo.py]
    - name: rei
      program: "@self"
      args: [rei]
  services:
    - name: chart
      program: streamlit
      args: [run, chart.py, --server.port, "{port}"]
      port: 8501
"#;

    #[test]
    fn parses_full_document() {
        let config = RootsenseConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.rei.horizon, "30");
        assert_eq!(config.rei.tracked_metrics.len(), 3);
        assert_eq!(config.pipeline.stagger(), Duration::from_millis(250));
        assert_eq!(config.pipeline.bounded.len(), 2);
        assert_eq!(config.pipeline.services[0].port, 8501);
        assert_eq!(
            config.notification.channels[0],
            NotificationChannelConfig::Ntfy {
                url: "https://ntfy.sh".into(),
                topic: "ops".into()
            }
        );
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = RootsenseConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, RootsenseConfig::default());
        assert_eq!(config.rei.horizon, DEFAULT_HORIZON);
    }

    #[test]
    fn rejects_duplicate_names_across_worker_classes() {
        let mut config = RootsenseConfig::default();
        config.pipeline.services.push(ServiceWorkerConfig {
            name: "rei".into(),
            program: "dash".into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            port: 8501,
        });
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateWorker("rei".into()))
        );
    }

    #[test]
    fn rejects_shared_service_port() {
        let service = |name: &str| ServiceWorkerConfig {
            name: name.into(),
            program: "dash".into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            port: 8501,
        };
        let mut config = RootsenseConfig::default();
        config.pipeline.services = vec![service("chart"), service("report")];
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicatePort {
                port: 8501,
                first: "chart".into(),
                second: "report".into()
            })
        );
    }

    #[test]
    fn rejects_blank_horizon() {
        let err = RootsenseConfig::from_yaml_str("rei:\n  horizon: \"  \"\n").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::EmptyHorizon)
        );
    }

    #[test]
    fn load_from_path_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RootsenseConfig::load_from_path(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
