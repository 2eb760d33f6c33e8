use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use rootsense_ports::{DetachedWorker, WorkerCommand, WorkerExit, WorkerLauncher};

/// Runs workers as child processes of the current one.
///
/// Children inherit stdout/stderr so their logs interleave with ours; stdin is
/// closed. Detached children outlive the handle that started them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    fn command(spec: &WorkerCommand) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .kill_on_drop(false);
        cmd
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn run(&self, spec: &WorkerCommand) -> Result<WorkerExit> {
        let status = Self::command(spec)
            .status()
            .await
            .with_context(|| format!("failed to run `{spec}`"))?;
        Ok(WorkerExit {
            code: status.code(),
        })
    }

    fn spawn_detached(&self, spec: &WorkerCommand) -> Result<DetachedWorker> {
        let child = Self::command(spec)
            .spawn()
            .with_context(|| format!("failed to spawn `{spec}`"))?;
        Ok(DetachedWorker::new(child.id(), child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_exit_codes() {
        let ok = ProcessLauncher
            .run(&WorkerCommand::new("sh").args(["-c", "exit 0"]))
            .await
            .unwrap();
        assert!(ok.success());

        let failed = ProcessLauncher
            .run(&WorkerCommand::new("sh").args(["-c", "exit 3"]))
            .await
            .unwrap();
        assert_eq!(failed.code, Some(3));
        assert!(!failed.success());
    }

    #[tokio::test]
    async fn passes_environment() {
        let exit = ProcessLauncher
            .run(
                &WorkerCommand::new("sh")
                    .args(["-c", "test \"$ROOTSENSE_PORT\" = 8501"])
                    .env("ROOTSENSE_PORT", "8501"),
            )
            .await
            .unwrap();
        assert!(exit.success());
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let command = WorkerCommand::new("/nonexistent/rootsense-worker");
        assert!(ProcessLauncher.run(&command).await.is_err());
        assert!(ProcessLauncher.spawn_detached(&command).is_err());
    }

    #[tokio::test]
    async fn detached_spawn_returns_immediately() {
        let started = std::time::Instant::now();
        let handle = ProcessLauncher
            .spawn_detached(&WorkerCommand::new("sleep").arg("2"))
            .unwrap();
        assert!(handle.pid.is_some());
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }
}
