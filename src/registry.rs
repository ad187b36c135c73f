//! Task Definition Registry
//!
//! Loads task files once, validates every definition up front, and hands
//! out shared immutable definitions by name.
//!
//! Load-time checks (nothing is executed before all of them pass):
//! - unique task names, step ids and parameter names
//! - `{{param.X}}` only for declared parameters
//! - `{{steps.X}}` only for steps declared earlier in the same task
//! - `query` is a supported JSONPath
//! - `result` names an existing step
//! - defaults match their declared type
//! - every tool alias names an executable

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::ast::{TaskDefinition, TaskFile, Tool};
use crate::binding::template::{self, Reference};
use crate::error::{OpsError, Result};
use crate::util::jsonpath;

/// Task file compiled into the binary
pub const BUILTIN_TASKS: &str = include_str!("../tasks/builtin.yaml");

/// Immutable name → definition mapping
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<Arc<TaskDefinition>>,
    index: FxHashMap<String, usize>,
    tools: BTreeMap<String, Tool>,
}

impl TaskRegistry {
    /// Parse and validate a task file from YAML text
    pub fn load(source: &str) -> Result<Self> {
        Self::from_task_file(TaskFile::from_yaml(source)?)
    }

    /// Read, parse and validate a task file from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => OpsError::TaskFileNotFound {
                path: path.display().to_string(),
            },
            _ => OpsError::Io(e),
        })?;
        debug!(path = %path.display(), "loading task file");
        Self::load(&source)
    }

    /// Tasks shipped with the binary
    pub fn builtin() -> Result<Self> {
        Self::load(BUILTIN_TASKS)
    }

    pub fn from_task_file(file: TaskFile) -> Result<Self> {
        for (alias, tool) in &file.tools {
            tool.validate(alias)?;
        }
        let mut registry = Self {
            tasks: Vec::with_capacity(file.tasks.len()),
            index: FxHashMap::default(),
            tools: file.tools,
        };

        for def in file.tasks {
            validate_definition(&def)?;
            if registry.index.contains_key(&def.name) {
                return Err(OpsError::DuplicateTask { name: def.name });
            }
            registry.index.insert(def.name.clone(), registry.tasks.len());
            registry.tasks.push(Arc::new(def));
        }

        Ok(registry)
    }

    /// Look up a task by name
    pub fn resolve(&self, name: &str) -> Result<Arc<TaskDefinition>> {
        self.get(name)
            .map(Arc::clone)
            .ok_or_else(|| OpsError::UnknownTask {
                name: name.to_string(),
            })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TaskDefinition>> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    /// Definitions in file order
    pub fn tasks(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.tasks.iter().map(|t| t.as_ref())
    }

    /// Tool aliases declared by the task file
    pub fn tools(&self) -> &BTreeMap<String, Tool> {
        &self.tools
    }

    /// What `program` runs as: `overrides` first, then the task file's
    /// aliases. `None` means the name is used as written.
    pub fn tool<'a>(
        &'a self,
        program: &str,
        overrides: &'a BTreeMap<String, Tool>,
    ) -> Option<&'a Tool> {
        overrides.get(program).or_else(|| self.tools.get(program))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Check one definition in isolation
pub fn validate_definition(def: &TaskDefinition) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(OpsError::ValidationError {
            reason: "task name must not be empty".to_string(),
        });
    }
    if def.steps.is_empty() {
        return Err(OpsError::ValidationError {
            reason: format!("task '{}' has no steps", def.name),
        });
    }

    let mut params = FxHashSet::default();
    for decl in &def.params {
        if !params.insert(decl.name.as_str()) {
            return Err(OpsError::DuplicateParameter {
                task: def.name.clone(),
                param: decl.name.clone(),
            });
        }
        if let Some(default) = &decl.default {
            decl.kind.check(&decl.name, default)?;
        }
    }

    let mut upstream: FxHashSet<&str> = FxHashSet::default();
    for step in &def.steps {
        if step.program.trim().is_empty() {
            return Err(OpsError::ValidationError {
                reason: format!("step '{}' of task '{}' has no program", step.id, def.name),
            });
        }

        for text in step.templates() {
            for reference in template::references(text)? {
                match reference {
                    Reference::Param(name) if !params.contains(name.as_str()) => {
                        return Err(OpsError::UndeclaredParameter {
                            task: def.name.clone(),
                            step: step.id.clone(),
                            param: name,
                        });
                    }
                    Reference::Step(id) if !upstream.contains(id.as_str()) => {
                        return Err(OpsError::StepNotUpstream {
                            task: def.name.clone(),
                            step: step.id.clone(),
                            source_step: id,
                        });
                    }
                    _ => {}
                }
            }
        }

        if let Some(query) = &step.query {
            jsonpath::parse(query)?;
        }

        if !upstream.insert(step.id.as_str()) {
            return Err(OpsError::DuplicateStep {
                task: def.name.clone(),
                step: step.id.clone(),
            });
        }
    }

    if let Some(result) = &def.result {
        if def.step(result).is_none() {
            return Err(OpsError::UnknownStep {
                task: def.name.clone(),
                step: result.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn file(tasks: &str) -> String {
        format!("schema: opsrun/tasks@0.1\ntasks:\n{}", tasks)
    }

    #[test]
    fn builtin_tasks_load() {
        let registry = TaskRegistry::builtin().unwrap();
        for name in ["transfer", "build", "list-hosts", "keygen"] {
            assert!(registry.get(name).is_some(), "missing builtin task {name}");
        }
        assert!(registry.tools().contains_key("casper-client"));
    }

    #[test]
    fn resolve_returns_loaded_definition() {
        let registry = TaskRegistry::load(&file(
            r#"
  - name: hello
    steps:
      - id: say
        program: echo
        args: [hello]
"#,
        ))
        .unwrap();

        let a = registry.resolve("hello").unwrap();
        let b = registry.resolve("hello").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.steps[0].args, vec!["hello".to_string()]);
    }

    #[test]
    fn unknown_task() {
        let registry = TaskRegistry::builtin().unwrap();
        let err = registry.resolve("deploy-everything").unwrap_err();
        assert!(matches!(err, OpsError::UnknownTask { .. }));
    }

    #[test]
    fn duplicate_task_names() {
        let err = TaskRegistry::load(&file(
            r#"
  - name: twice
    steps: [{id: a, program: "true"}]
  - name: twice
    steps: [{id: a, program: "true"}]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, OpsError::DuplicateTask { ref name } if name == "twice"));
    }

    #[test]
    fn duplicate_step_ids() {
        let err = TaskRegistry::load(&file(
            r#"
  - name: t
    steps: [{id: a, program: "true"}, {id: a, program: "true"}]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, OpsError::DuplicateStep { .. }));
    }

    #[test]
    fn duplicate_params() {
        let err = TaskRegistry::load(&file(
            r#"
  - name: t
    params: [{name: p}, {name: p}]
    steps: [{id: a, program: "true"}]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, OpsError::DuplicateParameter { .. }));
    }

    #[test]
    fn undeclared_parameter_reference() {
        let err = TaskRegistry::load(&file(
            r#"
  - name: t
    params: [{name: declared}]
    steps:
      - id: a
        program: echo
        args: ["{{param.declared}}", "{{param.typo}}"]
"#,
        ))
        .unwrap_err();
        assert!(
            matches!(err, OpsError::UndeclaredParameter { ref param, ref step, .. } if param == "typo" && step == "a")
        );
    }

    #[test]
    fn undeclared_parameter_in_cwd() {
        let err = TaskRegistry::load(&file(
            r#"
  - name: t
    steps:
      - id: a
        program: cargo
        cwd: "{{param.repo}}"
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, OpsError::UndeclaredParameter { .. }));
    }

    #[test]
    fn step_reference_must_be_upstream() {
        let err = TaskRegistry::load(&file(
            r#"
  - name: t
    steps:
      - id: a
        program: echo
        args: ["{{steps.b}}"]
      - id: b
        program: echo
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, OpsError::StepNotUpstream { ref source_step, .. } if source_step == "b"));

        let err = TaskRegistry::load(&file(
            r#"
  - name: t
    steps:
      - id: a
        program: echo
        args: ["{{steps.a}}"]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, OpsError::StepNotUpstream { .. }));
    }

    #[test]
    fn upstream_step_reference_is_fine() {
        let registry = TaskRegistry::load(&file(
            r#"
  - name: t
    steps:
      - id: a
        program: echo
        args: ["x"]
      - id: b
        program: echo
        env: {PREVIOUS: "{{steps.a}}"}
"#,
        ))
        .unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn bad_query_and_result() {
        let err = TaskRegistry::load(&file(
            r#"
  - name: t
    steps: [{id: a, program: echo, query: "$.a[0:2]"}]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, OpsError::JsonPathUnsupported { .. }));

        let err = TaskRegistry::load(&file(
            r#"
  - name: t
    steps: [{id: a, program: echo}]
    result: b
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, OpsError::UnknownStep { .. }));
    }

    #[test]
    fn bad_default_and_empty_steps() {
        let err = TaskRegistry::load(&file(
            r#"
  - name: t
    params: [{name: n, type: integer, default: "many"}]
    steps: [{id: a, program: echo}]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, OpsError::InvalidParameter { .. }));

        let err = TaskRegistry::load(&file(
            r#"
  - name: t
    steps: []
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, OpsError::ValidationError { .. }));
    }

    #[test]
    fn unknown_template_namespace() {
        let err = TaskRegistry::load(&file(
            r#"
  - name: t
    steps: [{id: a, program: echo, args: ["{{env.HOME}}"]}]
"#,
        ))
        .unwrap_err();
        assert!(matches!(err, OpsError::TemplateParse { .. }));
    }

    #[test]
    fn missing_file() {
        let err = TaskRegistry::from_file("/nonexistent/opsrun/tasks.yaml").unwrap_err();
        assert!(matches!(err, OpsError::TaskFileNotFound { .. }));
    }

    #[test]
    fn tasks_keep_file_order() {
        let registry = TaskRegistry::builtin().unwrap();
        let names: Vec<_> = registry.tasks().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["transfer", "build", "list-hosts", "keygen"]);
    }

    #[test]
    fn tool_aliases_and_overrides() {
        let registry = TaskRegistry::load(
            r#"
schema: opsrun/tasks@0.1
tools:
  client: [cargo, run, --quiet, --]
  aws: /usr/local/bin/aws
tasks:
  - name: t
    steps: [{id: a, program: client}]
"#,
        )
        .unwrap();

        let none = BTreeMap::new();
        assert_eq!(registry.tool("client", &none).map(Tool::program), Some("cargo"));
        assert_eq!(registry.tool("cargo", &none), None);

        let overrides = BTreeMap::from([("client".to_string(), Tool::from("/opt/client"))]);
        assert_eq!(
            registry.tool("client", &overrides).map(Tool::to_string),
            Some("/opt/client".to_string())
        );
        assert_eq!(
            registry.tool("aws", &overrides).map(Tool::program),
            Some("/usr/local/bin/aws")
        );
    }

    #[test]
    fn empty_tool_command_is_rejected() {
        let err = TaskRegistry::load(
            "schema: opsrun/tasks@0.1\ntools:\n  client: []\ntasks:\n  - name: t\n    steps: [{id: a, program: client}]\n",
        )
        .unwrap_err();
        assert!(matches!(err, OpsError::ValidationError { .. }));
        assert!(err.to_string().contains("client"));
    }
}
