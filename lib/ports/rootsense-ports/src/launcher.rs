use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

/// A program invocation, independent of how it gets executed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a bounded worker ended. `code` is `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub code: Option<i32>,
}

impl WorkerExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Handle to a worker that is never joined. Holding it keeps whatever the
/// launcher needs alive; dropping it does not stop the worker.
pub struct DetachedWorker {
    pub pid: Option<u32>,
    _handle: Box<dyn Any + Send>,
}

impl DetachedWorker {
    pub fn new(pid: Option<u32>, handle: impl Any + Send) -> Self {
        Self {
            pid,
            _handle: Box::new(handle),
        }
    }
}

impl fmt::Debug for DetachedWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetachedWorker").field("pid", &self.pid).finish()
    }
}

#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Runs `command` to completion. `Err` means it could not be started or
    /// awaited at all.
    async fn run(&self, command: &WorkerCommand) -> Result<WorkerExit>;

    /// Starts `command` and returns without waiting on it.
    fn spawn_detached(&self, command: &WorkerCommand) -> Result<DetachedWorker>;
}
