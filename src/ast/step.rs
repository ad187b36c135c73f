//! Step definition - one external process invocation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

/// One external process invocation within a task
///
/// `args`, `cwd`, `env` values and `read_output` are templates; each
/// argument template always produces exactly one argv element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub id: String,
    /// Tool alias or executable name/path
    pub program: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// JSONPath applied to the step's output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub abort_on_failure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub inherit_env: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Read the step's output from this file instead of stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_output: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            program: program.into(),
            args: Vec::new(),
            query: None,
            abort_on_failure: true,
            cwd: None,
            env: BTreeMap::new(),
            inherit_env: true,
            timeout_secs: None,
            read_output: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn continue_on_failure(mut self) -> Self {
        self.abort_on_failure = false;
        self
    }

    /// Every template string carried by this step
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .map(String::as_str)
            .chain(self.cwd.as_deref())
            .chain(self.env.values().map(String::as_str))
            .chain(self.read_output.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_yaml() {
        let step: Step = serde_yaml::from_str("id: build\nprogram: cargo").unwrap();
        assert!(step.abort_on_failure);
        assert!(step.inherit_env);
        assert!(step.args.is_empty());
        assert_eq!(step, Step::new("build", "cargo"));
    }

    #[test]
    fn templates_cover_all_fields() {
        let mut step = Step::new("s", "tool").with_args(["{{param.a}}", "x"]);
        step.cwd = Some("{{param.dir}}".into());
        step.env.insert("KEY".into(), "{{steps.prev}}".into());
        step.read_output = Some("{{param.dir}}/out".into());

        let all: Vec<_> = step.templates().collect();
        assert_eq!(
            all,
            vec![
                "{{param.a}}",
                "x",
                "{{param.dir}}",
                "{{steps.prev}}",
                "{{param.dir}}/out"
            ]
        );
    }

    #[test]
    fn serialization_skips_defaults() {
        let yaml = serde_yaml::to_string(&Step::new("s", "tool")).unwrap();
        assert!(!yaml.contains("abort_on_failure"));
        assert!(!yaml.contains("inherit_env"));

        let yaml = serde_yaml::to_string(&Step::new("s", "tool").continue_on_failure()).unwrap();
        assert!(yaml.contains("abort_on_failure: false"));
    }
}
