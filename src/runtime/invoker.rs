//! Process Invoker - run one external command to completion
//!
//! Arguments are handed to the OS as discrete argv tokens. There is no
//! shell in between, so parameter values cannot inject extra commands.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Everything needed to start one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Variables set on top of (or instead of) the inherited environment
    pub env: BTreeMap<String, String>,
    pub inherit_env: bool,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            inherit_env: true,
            cwd: None,
            timeout: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Captured result of a process that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Why a process did not run to completion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    #[error("failed to start '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("timed out after {}s", .timeout.as_secs())]
    Timeout { timeout: Duration },

    #[error("cancelled")]
    Cancelled,
}

/// Runs a single external process
///
/// The call resolves only once the process has exited, been killed on
/// timeout, or been killed because `cancel` fired.
#[async_trait]
pub trait ProcessInvoker: Send + Sync {
    async fn invoke(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, InvokeError>;
}

/// [`ProcessInvoker`] backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct SystemInvoker;

impl SystemInvoker {
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if !invocation.inherit_env {
            cmd.env_clear();
        }
        cmd.envs(&invocation.env);

        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl ProcessInvoker for SystemInvoker {
    async fn invoke(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, InvokeError> {
        debug!(program = %invocation.program, args = ?invocation.args, cwd = ?invocation.cwd, "spawning");

        let child = Self::command(invocation)
            .spawn()
            .map_err(|e| InvokeError::Spawn {
                program: invocation.program.clone(),
                reason: e.to_string(),
            })?;

        let deadline = async {
            match invocation.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        // Dropping `wait` drops the child, and kill_on_drop terminates it
        let wait = child.wait_with_output();
        let output = tokio::select! {
            output = wait => output.map_err(|e| InvokeError::Spawn {
                program: invocation.program.clone(),
                reason: e.to_string(),
            })?,
            _ = cancel.cancelled() => return Err(InvokeError::Cancelled),
            _ = deadline => {
                return Err(InvokeError::Timeout {
                    timeout: invocation.timeout.unwrap_or_default(),
                })
            }
        };

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
