//! Tool aliases - what a step's `program` name stands for
//!
//! An alias maps either to a single executable or to an executable plus
//! leading arguments, so a client can be launched through a wrapper:
//!
//! ```yaml
//! tools:
//!   aws: /usr/local/bin/aws
//!   casper-client: [cargo, run, --quiet, --manifest-path=client/Cargo.toml, --]
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OpsError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tool {
    /// Executable path or name
    Program(String),
    /// Executable followed by arguments placed before every step argument
    Command(Vec<String>),
}

impl Tool {
    /// The executable to spawn
    pub fn program(&self) -> &str {
        match self {
            Tool::Program(program) => program,
            Tool::Command(words) => words.first().map_or("", String::as_str),
        }
    }

    /// Arguments inserted ahead of the step's own
    pub fn prefix_args(&self) -> &[String] {
        match self {
            Tool::Program(_) => &[],
            Tool::Command(words) => words.get(1..).unwrap_or_default(),
        }
    }

    pub fn validate(&self, alias: &str) -> Result<()> {
        if self.program().trim().is_empty() {
            return Err(OpsError::ValidationError {
                reason: format!("tool '{}' must name an executable", alias),
            });
        }
        Ok(())
    }
}

impl From<&str> for Tool {
    fn from(program: &str) -> Self {
        Tool::Program(program.to_string())
    }
}

impl From<Vec<String>> for Tool {
    fn from(words: Vec<String>) -> Self {
        Tool::Command(words)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Program(program) => f.write_str(program),
            Tool::Command(words) => f.write_str(&words.join(" ")),
        }
    }
}
