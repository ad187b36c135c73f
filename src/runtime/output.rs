//! Step and task results
//!
//! An [`ExecutionResult`] is built exactly once per step run and never
//! changed afterwards. A [`TaskResult`] owns the ordered list of them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::OpsError;

/// Why a step did not produce a value
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepFailure {
    #[error("template error: {reason}")]
    Template { reason: String },

    #[error("could not start process: {reason}")]
    Spawn { reason: String },

    #[error("exited with {}", describe_exit(.exit_code))]
    ExitStatus { exit_code: Option<i32> },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("could not read output file '{path}': {reason}")]
    ReadOutput { path: String, reason: String },

    #[error("output is not valid JSON: {details}")]
    Parse { details: String },

    #[error("path '{path}' matched nothing")]
    PathNotFound { path: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

impl StepFailure {
    /// Map an extraction error onto the step failure it represents
    pub fn from_extract(err: OpsError) -> Self {
        match err {
            OpsError::ParseError { details } => StepFailure::Parse { details },
            OpsError::PathNotFound { path } => StepFailure::PathNotFound { path },
            other => StepFailure::Parse {
                details: other.to_string(),
            },
        }
    }
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub step_id: String,
    /// Resolved program (after tool alias lookup)
    pub program: String,
    /// Resolved arguments, as passed to the process
    pub args: Vec<String>,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Extracted value, or trimmed output when the step declares no query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Outcome of one task run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: String,
    /// One entry per step that ran, in execution order
    pub steps: Vec<ExecutionResult>,
    /// True iff every abort-on-failure step that ran succeeded and the run was not cancelled
    pub success: bool,
    pub cancelled: bool,
    /// The task's result value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl TaskResult {
    /// Build the result, picking the output from `result_step` if given,
    /// else from the last step that produced a value
    pub fn new(
        task: impl Into<String>,
        result_step: Option<&str>,
        steps: Vec<ExecutionResult>,
        success: bool,
        cancelled: bool,
    ) -> Self {
        let output = match result_step {
            Some(id) => steps
                .iter()
                .find(|s| s.step_id == id)
                .and_then(|s| s.value.clone()),
            None => steps.iter().rev().find_map(|s| s.value.clone()),
        };

        Self {
            task: task.into(),
            steps,
            success,
            cancelled,
            output,
        }
    }

    pub fn step(&self, id: &str) -> Option<&ExecutionResult> {
        self.steps.iter().find(|s| s.step_id == id)
    }

    pub fn first_failure(&self) -> Option<&ExecutionResult> {
        self.steps.iter().find(|s| !s.succeeded())
    }

    /// The failed step that ended the run
    ///
    /// Tolerated failures (`abort_on_failure: false`) may come earlier;
    /// the aborting step is always the last one that ran.
    pub fn aborting_failure(&self) -> Option<&ExecutionResult> {
        if self.success {
            return None;
        }
        self.steps.iter().rev().find(|s| !s.succeeded())
    }

    /// The error describing why this run did not succeed, if it did not
    pub fn error(&self) -> Option<OpsError> {
        if self.cancelled {
            return Some(OpsError::Cancelled {
                task: self.task.clone(),
            });
        }
        let failed = self.aborting_failure()?;
        Some(OpsError::StepFailed {
            task: self.task.clone(),
            step: failed.step_id.clone(),
            reason: failed
                .failure
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        })
    }
}
