//! Launches the pipeline's workers for one run.
//!
//! Bounded workers run concurrently and are joined before `run_once` returns.
//! Service workers are started one after another with a fixed stagger and
//! then left alone: they are never awaited, supervised or restarted.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use rootsense_domain::{ConfigError, PipelineConfig, SELF_PROGRAM};
use rootsense_ports::{DetachedWorker, WorkerCommand, WorkerExit, WorkerLauncher};

/// Environment variable carrying a service worker's port.
pub const PORT_ENV: &str = "ROOTSENSE_PORT";
/// Substituted with the service port in service arguments.
pub const PORT_PLACEHOLDER: &str = "{port}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Bounded,
    Service { port: u16 },
}

/// A fully resolved worker: what to launch and how to treat it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub name: String,
    pub kind: WorkerKind,
    pub command: WorkerCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ServiceLaunch {
    pub name: String,
    pub port: u16,
    pub pid: Option<u32>,
    pub launched_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    AllSucceeded,
    /// Names of the bounded workers that failed, in configuration order.
    Failed(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<WorkerFailure>,
    pub services: Vec<ServiceLaunch>,
    pub service_failures: Vec<WorkerFailure>,
}

impl RunReport {
    /// Aggregate status over bounded workers. Service launch failures are
    /// reported separately and never fail the run.
    pub fn status(&self) -> RunStatus {
        if self.failed.is_empty() {
            RunStatus::AllSucceeded
        } else {
            RunStatus::Failed(self.failed.iter().map(|f| f.name.clone()).collect())
        }
    }
}

pub struct Orchestrator {
    config: PipelineConfig,
    launcher: Arc<dyn WorkerLauncher>,
    self_program: String,
    shared_env: BTreeMap<String, String>,
    detached: Vec<DetachedWorker>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        launcher: Arc<dyn WorkerLauncher>,
        self_program: impl Into<String>,
    ) -> Self {
        Self {
            config,
            launcher,
            self_program: self_program.into(),
            shared_env: BTreeMap::new(),
            detached: Vec::new(),
        }
    }

    /// Adds an environment variable to every worker this orchestrator starts.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.shared_env.insert(key.into(), value.into());
        self
    }

    /// Handles of service workers started so far.
    pub fn detached(&self) -> &[DetachedWorker] {
        &self.detached
    }

    /// Resolves the configured workers into launchable specs, bounded first.
    pub fn plan(&self) -> Vec<WorkerSpec> {
        let bounded = self.config.bounded.iter().map(|worker| {
            let mut command = WorkerCommand::new(self.resolve_program(&worker.program))
                .args(worker.args.iter().cloned());
            command.env.extend(self.shared_env.clone());
            command.env.extend(worker.env.clone());
            WorkerSpec {
                name: worker.name.clone(),
                kind: WorkerKind::Bounded,
                command,
            }
        });
        let services = self.config.services.iter().map(|service| {
            let port = service.port.to_string();
            let mut command = WorkerCommand::new(self.resolve_program(&service.program))
                .args(service.args.iter().map(|arg| arg.replace(PORT_PLACEHOLDER, &port)));
            command.env.extend(self.shared_env.clone());
            command.env.extend(service.env.clone());
            command.env.insert(PORT_ENV.to_string(), port);
            WorkerSpec {
                name: service.name.clone(),
                kind: WorkerKind::Service { port: service.port },
                command,
            }
        });
        bounded.chain(services).collect()
    }

    /// Runs one pass of the pipeline.
    ///
    /// Returns `Err` only for an invalid configuration, in which case nothing
    /// was launched. Worker failures are collected in the report.
    pub async fn run_once(&mut self) -> Result<RunReport, ConfigError> {
        self.config.validate()?;

        let (bounded, services): (Vec<_>, Vec<_>) = self
            .plan()
            .into_iter()
            .partition(|spec| spec.kind == WorkerKind::Bounded);

        tracing::info!(
            bounded = bounded.len(),
            services = services.len(),
            "starting pipeline run"
        );

        let handles: Vec<(String, JoinHandle<anyhow::Result<WorkerExit>>)> = bounded
            .into_iter()
            .map(|spec| {
                let launcher = self.launcher.clone();
                tracing::info!(worker = %spec.name, command = %spec.command, "launching worker");
                let handle = tokio::spawn(async move { launcher.run(&spec.command).await });
                (spec.name, handle)
            })
            .collect();

        let mut report = RunReport::default();
        let stagger = self.config.stagger();
        self.launch_services(services, stagger, &mut report).await;

        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(exit)) if exit.success() => {
                    tracing::info!(worker = %name, "worker finished");
                    report.succeeded.push(name);
                }
                Ok(Ok(exit)) => {
                    tracing::error!(worker = %name, %exit, "worker failed");
                    report.failed.push(WorkerFailure {
                        name,
                        reason: exit.to_string(),
                    });
                }
                Ok(Err(err)) => {
                    tracing::error!(worker = %name, error = %format!("{err:#}"), "worker failed");
                    report.failed.push(WorkerFailure {
                        name,
                        reason: format!("{err:#}"),
                    });
                }
                Err(err) => {
                    tracing::error!(worker = %name, error = %err, "worker task panicked");
                    report.failed.push(WorkerFailure {
                        name,
                        reason: "worker task panicked".to_string(),
                    });
                }
            }
        }

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "pipeline run finished"
        );
        Ok(report)
    }

    async fn launch_services(
        &mut self,
        services: Vec<WorkerSpec>,
        stagger: Duration,
        report: &mut RunReport,
    ) {
        for (index, spec) in services.into_iter().enumerate() {
            if index > 0 && !stagger.is_zero() {
                tokio::time::sleep(stagger).await;
            }
            let WorkerKind::Service { port } = spec.kind else {
                continue;
            };
            match self.launcher.spawn_detached(&spec.command) {
                Ok(worker) => {
                    tracing::info!(service = %spec.name, port, pid = ?worker.pid, "service started");
                    report.services.push(ServiceLaunch {
                        name: spec.name,
                        port,
                        pid: worker.pid,
                        launched_at: Instant::now(),
                    });
                    self.detached.push(worker);
                }
                Err(err) => {
                    tracing::warn!(service = %spec.name, port, error = %format!("{err:#}"), "service failed to start");
                    report.service_failures.push(WorkerFailure {
                        name: spec.name,
                        reason: format!("{err:#}"),
                    });
                }
            }
        }
    }

    fn resolve_program(&self, program: &str) -> String {
        if program == SELF_PROGRAM {
            self.self_program.clone()
        } else {
            program.to_string()
        }
    }
}
