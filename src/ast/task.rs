//! Task file and task definition structures

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{OpsError, Result};

use super::param::ParamDecl;
use super::step::Step;
use super::tool::Tool;

/// Schema version accepted by this release
pub const SCHEMA_V01: &str = "opsrun/tasks@0.1";

/// A task file as written on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskFile {
    pub schema: String,
    /// Tool alias → executable, optionally with leading arguments
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, Tool>,
    pub tasks: Vec<TaskDefinition>,
}

impl TaskFile {
    /// Parse a task file and check its schema version
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: TaskFile = serde_yaml::from_str(yaml)?;
        file.validate_schema()?;
        Ok(file)
    }

    pub fn validate_schema(&self) -> Result<()> {
        if self.schema != SCHEMA_V01 {
            return Err(OpsError::InvalidSchema {
                expected: SCHEMA_V01.to_string(),
                actual: self.schema.clone(),
            });
        }
        Ok(())
    }
}

/// A named, parameterized pipeline of external command invocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamDecl>,
    pub steps: Vec<Step>,
    /// Step whose value is the task's result (defaults to the last value produced)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl TaskDefinition {
    pub fn param(&self, name: &str) -> Option<&ParamDecl> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Parameters that must be supplied by the caller
    pub fn required_params(&self) -> impl Iterator<Item = &ParamDecl> {
        self.params.iter().filter(|p| p.is_required())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ParamType;

    const TRANSFER: &str = r#"
schema: opsrun/tasks@0.1
tools:
  casper-client: /opt/casper/bin/casper-client
tasks:
  - name: transfer
    description: Submit a transfer
    params:
      - name: chain-name
      - name: gas-price
        type: integer
        default: "1"
    steps:
      - id: submit
        program: casper-client
        args: [transfer, --chain-name, "{{param.chain-name}}"]
        query: $.result.deploy_hash
    result: submit
"#;

    #[test]
    fn parse_task_file() {
        let file = TaskFile::from_yaml(TRANSFER).unwrap();
        assert_eq!(file.tools["casper-client"].program(), "/opt/casper/bin/casper-client");
        assert_eq!(file.tasks.len(), 1);

        let task = &file.tasks[0];
        assert_eq!(task.name, "transfer");
        assert_eq!(task.result.as_deref(), Some("submit"));
        assert_eq!(task.param("gas-price").unwrap().kind, ParamType::Integer);
        assert_eq!(task.step_index("submit"), Some(0));
        assert_eq!(
            task.required_params().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["chain-name"]
        );
    }

    #[test]
    fn reject_wrong_schema() {
        let yaml = TRANSFER.replace("opsrun/tasks@0.1", "opsrun/tasks@9.9");
        let err = TaskFile::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, OpsError::InvalidSchema { .. }));
    }

    #[test]
    fn reject_unknown_fields() {
        let yaml = TRANSFER.replace("result: submit", "reslt: submit");
        let err = TaskFile::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, OpsError::TaskFileParse { .. }));
    }
}
