//! opsrun - operational task runner (v0.1)
//!
//! Named, parameterized pipelines of external commands. Each step's output
//! can be narrowed with a JSONPath query and fed to later steps.
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN MODEL                          │
//! │  ast/       YAML → Rust types (TaskFile, TaskDefinition)     │
//! │  registry   Load + validate task files, resolve by name      │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  binding/   Parameter binding and templates                  │
//! │  runtime/   TaskRunner, ProcessInvoker                       │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  event/     Execution event log                              │
//! │  util/      JSONPath extraction                              │
//! │  config     User configuration (TOML + env)                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`ast`] | YAML parsing → `TaskFile`, `TaskDefinition`, `Step`, `ParamDecl` |
//! | [`registry`] | Task Definition Registry with load-time validation |
//! | [`binding`] | Typed parameter binding, `{{param.X}}` / `{{steps.X}}` templates |
//! | [`runtime`] | Sequential step execution, process spawning, cancellation |
//! | [`event`] | Append-only event log, JSON Lines export |
//! | [`util`] | JSONPath subset for structured extraction |
//! | [`config`] | `~/.config/opsrun/config.toml` with env overrides |
//! | [`error`] | Error types with codes, help text and exit codes |

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL
// ═══════════════════════════════════════════════════════════════
pub mod ast;
pub mod registry;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER
// ═══════════════════════════════════════════════════════════════
pub mod binding;
pub mod runtime;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;
pub mod event;
pub mod util;

pub use ast::{ParamDecl, ParamType, Step, TaskDefinition, TaskFile, Tool};
pub use binding::{parse_cli_params, ParamBindings, Params};
pub use config::OpsConfig;
pub use error::{OpsError, Result};
pub use event::{Event, EventKind, EventLog};
pub use registry::TaskRegistry;
pub use runtime::{
    ExecutionResult, Invocation, InvokeError, ProcessInvoker, ProcessOutput, StepFailure,
    SystemInvoker, TaskResult, TaskRunner,
};
pub use util::jsonpath::extract;
