//! Runtime Module - task execution
//!
//! - `invoker`: one external process per call (ProcessInvoker, SystemInvoker)
//! - `runner`: sequential step pipeline for a named task (TaskRunner)
//! - `output`: per-step and per-task results (ExecutionResult, TaskResult)
//!
//! This module is the "how". For the static structure of a task, see `ast`.

mod invoker;
mod output;
mod runner;

pub use invoker::{Invocation, InvokeError, ProcessInvoker, ProcessOutput, SystemInvoker};
pub use output::{ExecutionResult, StepFailure, TaskResult};
pub use runner::TaskRunner;
