use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use rootsense_adapter_notification::build_sinks;
use rootsense_adapter_storage::open_store;
use rootsense_application::{Orchestrator, ProcessLauncher, ReiEngine, SummaryNotifier};
use rootsense_domain::RootsenseConfig;
use rootsense_ports::DocumentStore;

pub const CONFIG_ENV: &str = "ROOTSENSE_CONFIG_PATH";

/// `$HOME/.rootsense/config.yaml`, or `rootsense-config.yaml` without a home.
pub fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return Path::new(&home).join(".rootsense").join("config.yaml");
    }
    PathBuf::from("rootsense-config.yaml")
}

/// Loaded configuration plus the file it came from, if any.
#[derive(Debug, Clone)]
pub struct Rootsense {
    pub config: RootsenseConfig,
    pub config_path: Option<PathBuf>,
}

impl Rootsense {
    /// Loads `explicit` when given (it must exist). Otherwise falls back to
    /// the default path, and to built-in defaults when that file is absent.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            let config = RootsenseConfig::load_from_path(&path)?;
            return Ok(Self {
                config,
                config_path: Some(path),
            });
        }

        let path = default_config_path();
        if path.exists() {
            let config = RootsenseConfig::load_from_path(&path)?;
            return Ok(Self {
                config,
                config_path: Some(path),
            });
        }
        Ok(Self::from_config(RootsenseConfig::default()))
    }

    pub fn from_config(config: RootsenseConfig) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    pub fn store(&self) -> Result<Arc<dyn DocumentStore>> {
        open_store(&self.config.store).context("failed to open document store")
    }

    pub fn rei_engine(&self) -> Result<ReiEngine> {
        Ok(ReiEngine::new(self.store()?, self.config.rei.clone()))
    }

    pub fn notifier(&self) -> Result<SummaryNotifier> {
        Ok(SummaryNotifier::new(
            self.store()?,
            build_sinks(&self.config.notification)?,
            self.config.notification.subject.clone(),
        ))
    }

    /// Workers launched as `@self` re-run this binary and inherit the
    /// config file through [`CONFIG_ENV`].
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let exe = std::env::current_exe().context("failed to locate the running executable")?;
        let orchestrator = Orchestrator::new(
            self.config.pipeline.clone(),
            Arc::new(ProcessLauncher),
            exe.to_string_lossy().into_owned(),
        );
        Ok(match &self.config_path {
            Some(path) => {
                let path = std::path::absolute(path).unwrap_or_else(|_| path.clone());
                orchestrator.with_env(CONFIG_ENV, path.to_string_lossy().into_owned())
            }
            None => orchestrator,
        })
    }
}
