// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! opsrun Error Types with Error Codes
//!
//! Error code ranges:
//! - OPS-000-009: Task file / load errors
//! - OPS-010-019: Registry validation errors
//! - OPS-020-029: Parameter errors
//! - OPS-030-039: Template errors
//! - OPS-040-049: Extraction (JSONPath) errors
//! - OPS-050-059: Execution errors
//! - OPS-060-069: Configuration errors
//!
//! Errors that happen inside a single step are not raised as `OpsError`:
//! they are captured as [`StepFailure`](crate::runtime::StepFailure) in the
//! step's result. Only load/validation errors abort before anything runs.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpsError>;

/// Process exit codes, one per failure category
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const UNKNOWN_TASK: i32 = 3;
    pub const PARAMETER: i32 = 4;
    pub const STEP_FAILED: i32 = 5;
    pub const CANCELLED: i32 = 130;
}

#[derive(Error, Debug, Diagnostic)]
pub enum OpsError {
    // ═══════════════════════════════════════════
    // TASK FILE ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[OPS-001] Failed to parse task file: {details}")]
    #[diagnostic(
        code(opsrun::task_file_parse),
        help("Check YAML syntax: indentation and quoting")
    )]
    TaskFileParse { details: String },

    #[error("[OPS-002] Invalid schema: expected '{expected}', got '{actual}'")]
    #[diagnostic(
        code(opsrun::invalid_schema),
        help("Start the task file with 'schema: opsrun/tasks@0.1'")
    )]
    InvalidSchema { expected: String, actual: String },

    #[error("[OPS-003] Task file not found: {path}")]
    #[diagnostic(code(opsrun::task_file_not_found), help("Check the file path exists"))]
    TaskFileNotFound { path: String },

    #[error("[OPS-004] Task validation failed: {reason}")]
    #[diagnostic(code(opsrun::validation_error))]
    ValidationError { reason: String },

    // ═══════════════════════════════════════════
    // REGISTRY ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[OPS-010] Unknown task '{name}'")]
    #[diagnostic(
        code(opsrun::unknown_task),
        help("Run 'opsrun list' to see the available tasks")
    )]
    UnknownTask { name: String },

    #[error("[OPS-011] Duplicate task name '{name}'")]
    #[diagnostic(code(opsrun::duplicate_task), help("Task names must be unique"))]
    DuplicateTask { name: String },

    #[error("[OPS-012] Duplicate step id '{step}' in task '{task}'")]
    #[diagnostic(code(opsrun::duplicate_step))]
    DuplicateStep { task: String, step: String },

    #[error("[OPS-013] Task '{task}' declares parameter '{param}' twice")]
    #[diagnostic(code(opsrun::duplicate_parameter))]
    DuplicateParameter { task: String, param: String },

    #[error("[OPS-014] Task '{task}' has no step '{step}'")]
    #[diagnostic(code(opsrun::unknown_step))]
    UnknownStep { task: String, step: String },

    #[error("[OPS-015] Step '{step}' of task '{task}' references parameter '{param}' which is not declared")]
    #[diagnostic(
        code(opsrun::undeclared_parameter),
        help("Declare the parameter under params: before using it in a template")
    )]
    UndeclaredParameter {
        task: String,
        step: String,
        param: String,
    },

    #[error("[OPS-016] Step '{step}' of task '{task}' uses '{{{{steps.{source_step}}}}}' which does not run before it")]
    #[diagnostic(
        code(opsrun::step_not_upstream),
        help("A step can only use values from steps declared earlier in the same task")
    )]
    StepNotUpstream {
        task: String,
        step: String,
        source_step: String,
    },

    // ═══════════════════════════════════════════
    // PARAMETER ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[OPS-020] Task '{task}' requires parameter '--{param}'")]
    #[diagnostic(code(opsrun::missing_parameter))]
    MissingParameter { task: String, param: String },

    #[error("[OPS-021] Task '{task}' has no parameter '--{param}'")]
    #[diagnostic(
        code(opsrun::unknown_parameter),
        help("Run 'opsrun show <task>' to see the declared parameters")
    )]
    UnknownParameter { task: String, param: String },

    #[error("[OPS-022] Invalid value for parameter '{param}': {reason}")]
    #[diagnostic(code(opsrun::invalid_parameter))]
    InvalidParameter { param: String, reason: String },

    // ═══════════════════════════════════════════
    // TEMPLATE ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[OPS-030] Template parse error at position {position}: {details}")]
    #[diagnostic(
        code(opsrun::template_parse),
        help("Reference param.NAME or steps.STEP_ID inside double braces; write four open braces for a literal pair")
    )]
    TemplateParse { position: usize, details: String },

    #[error("[OPS-031] Template '{template}' could not be resolved: {reason}")]
    #[diagnostic(code(opsrun::template_error))]
    Template { template: String, reason: String },

    // ═══════════════════════════════════════════
    // EXTRACTION ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[OPS-040] Output is not valid JSON: {details}")]
    #[diagnostic(
        code(opsrun::parse_error),
        help("Make sure the tool prints JSON (e.g. pass --output json)")
    )]
    ParseError { details: String },

    #[error("[OPS-041] Path '{path}' matched nothing")]
    #[diagnostic(code(opsrun::path_not_found))]
    PathNotFound { path: String },

    #[error("[OPS-042] JSONPath '{path}' is not supported: {reason}")]
    #[diagnostic(
        code(opsrun::jsonpath_unsupported),
        help("Use $.a.b, $.a[0].b, $.a[*].b or $.a[?(@.k == 'v')].b")
    )]
    JsonPathUnsupported { path: String, reason: String },

    // ═══════════════════════════════════════════
    // EXECUTION ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[OPS-050] Step '{step}' of task '{task}' failed: {reason}")]
    #[diagnostic(code(opsrun::step_failed))]
    StepFailed {
        task: String,
        step: String,
        reason: String,
    },

    #[error("[OPS-051] Task '{task}' was cancelled")]
    #[diagnostic(code(opsrun::cancelled))]
    Cancelled { task: String },

    #[error("[OPS-052] IO error: {0}")]
    #[diagnostic(code(opsrun::io), help("Check file path and permissions"))]
    Io(#[from] std::io::Error),

    #[error("[OPS-053] JSON error: {0}")]
    #[diagnostic(code(opsrun::json))]
    Json(#[from] serde_json::Error),

    // ═══════════════════════════════════════════
    // CONFIG ERRORS (060-069)
    // ═══════════════════════════════════════════
    #[error("[OPS-060] Configuration error: {reason}")]
    #[diagnostic(
        code(opsrun::config_error),
        help("Check ~/.config/opsrun/config.toml or the file passed with --config")
    )]
    ConfigError { reason: String },
}

impl From<serde_yaml::Error> for OpsError {
    fn from(err: serde_yaml::Error) -> Self {
        OpsError::TaskFileParse {
            details: err.to_string(),
        }
    }
}

impl OpsError {
    /// Process exit code for this failure category
    pub fn exit_code(&self) -> i32 {
        match self {
            OpsError::UnknownTask { .. } => exit_code::UNKNOWN_TASK,
            OpsError::MissingParameter { .. }
            | OpsError::UnknownParameter { .. }
            | OpsError::InvalidParameter { .. } => exit_code::PARAMETER,
            OpsError::StepFailed { .. } => exit_code::STEP_FAILED,
            OpsError::Cancelled { .. } => exit_code::CANCELLED,
            _ => exit_code::GENERAL,
        }
    }

    /// Short error code (e.g. "OPS-010") for log fields
    pub fn code(&self) -> &'static str {
        match self {
            OpsError::TaskFileParse { .. } => "OPS-001",
            OpsError::InvalidSchema { .. } => "OPS-002",
            OpsError::TaskFileNotFound { .. } => "OPS-003",
            OpsError::ValidationError { .. } => "OPS-004",
            OpsError::UnknownTask { .. } => "OPS-010",
            OpsError::DuplicateTask { .. } => "OPS-011",
            OpsError::DuplicateStep { .. } => "OPS-012",
            OpsError::DuplicateParameter { .. } => "OPS-013",
            OpsError::UnknownStep { .. } => "OPS-014",
            OpsError::UndeclaredParameter { .. } => "OPS-015",
            OpsError::StepNotUpstream { .. } => "OPS-016",
            OpsError::MissingParameter { .. } => "OPS-020",
            OpsError::UnknownParameter { .. } => "OPS-021",
            OpsError::InvalidParameter { .. } => "OPS-022",
            OpsError::TemplateParse { .. } => "OPS-030",
            OpsError::Template { .. } => "OPS-031",
            OpsError::ParseError { .. } => "OPS-040",
            OpsError::PathNotFound { .. } => "OPS-041",
            OpsError::JsonPathUnsupported { .. } => "OPS-042",
            OpsError::StepFailed { .. } => "OPS-050",
            OpsError::Cancelled { .. } => "OPS-051",
            OpsError::Io(_) => "OPS-052",
            OpsError::Json(_) => "OPS-053",
            OpsError::ConfigError { .. } => "OPS-060",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_category() {
        let unknown = OpsError::UnknownTask {
            name: "nope".into(),
        };
        let missing = OpsError::MissingParameter {
            task: "transfer".into(),
            param: "amount".into(),
        };
        let failed = OpsError::StepFailed {
            task: "transfer".into(),
            step: "submit".into(),
            reason: "exit status 1".into(),
        };

        assert_eq!(unknown.exit_code(), exit_code::UNKNOWN_TASK);
        assert_eq!(missing.exit_code(), exit_code::PARAMETER);
        assert_eq!(failed.exit_code(), exit_code::STEP_FAILED);
        assert_ne!(unknown.exit_code(), missing.exit_code());
        assert_ne!(missing.exit_code(), failed.exit_code());
    }

    #[test]
    fn display_includes_code() {
        let err = OpsError::UnknownTask {
            name: "deploy".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("OPS-010"));
        assert!(msg.contains("deploy"));
        assert_eq!(err.code(), "OPS-010");
    }

    #[test]
    fn step_not_upstream_renders_template_braces() {
        let err = OpsError::StepNotUpstream {
            task: "t".into(),
            step: "b".into(),
            source_step: "c".into(),
        };
        assert!(err.to_string().contains("{{steps.c}}"));
    }

    #[test]
    fn help_text_is_available() {
        let err = OpsError::UnknownTask { name: "x".into() };
        let help = err.help().map(|h| h.to_string());
        assert_eq!(
            help.as_deref(),
            Some("Run 'opsrun list' to see the available tasks")
        );
    }

    #[test]
    fn yaml_errors_become_parse_errors() {
        let err: OpsError = serde_yaml::from_str::<serde_yaml::Value>("a: [unclosed")
            .unwrap_err()
            .into();
        assert!(matches!(err, OpsError::TaskFileParse { .. }));
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }
}
