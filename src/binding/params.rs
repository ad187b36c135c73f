//! Parameter binding - caller values checked against a task's declarations

use std::collections::BTreeMap;

use crate::ast::TaskDefinition;
use crate::error::{OpsError, Result};

/// Raw caller-supplied parameters (name → value)
pub type Params = BTreeMap<String, String>;

/// Parameters validated against a [`TaskDefinition`], defaults applied
///
/// Every declared parameter has an entry. Optional parameters without a
/// default that the caller left out are bound to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamBindings {
    values: BTreeMap<String, String>,
}

impl ParamBindings {
    /// Bind `supplied` to `def`
    ///
    /// Fails before anything runs with `UnknownParameter`, `MissingParameter`
    /// or `InvalidParameter`.
    pub fn bind(def: &TaskDefinition, supplied: &Params) -> Result<Self> {
        if let Some(unknown) = supplied.keys().find(|k| def.param(k).is_none()) {
            return Err(OpsError::UnknownParameter {
                task: def.name.clone(),
                param: unknown.clone(),
            });
        }

        let mut values = BTreeMap::new();
        for decl in &def.params {
            let value = supplied.get(&decl.name).or(decl.default.as_ref());
            match value {
                Some(value) => {
                    decl.kind.check(&decl.name, value)?;
                    values.insert(decl.name.clone(), value.clone());
                }
                None if decl.is_required() => {
                    return Err(OpsError::MissingParameter {
                        task: def.name.clone(),
                        param: decl.name.clone(),
                    });
                }
                None => {
                    values.insert(decl.name.clone(), String::new());
                }
            }
        }

        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parse `--name value` / `--name=value` pairs from the command line
pub fn parse_cli_params<I, S>(args: I) -> Result<Params>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut params = Params::new();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        let Some(flag) = arg.strip_prefix("--") else {
            return Err(OpsError::InvalidParameter {
                param: arg.to_string(),
                reason: "expected '--name value'".to_string(),
            });
        };

        let (name, value) = match flag.split_once('=') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => {
                let value = iter.next().ok_or_else(|| OpsError::InvalidParameter {
                    param: flag.to_string(),
                    reason: "missing value".to_string(),
                })?;
                (flag.to_string(), value.as_ref().to_string())
            }
        };

        if name.is_empty() {
            return Err(OpsError::InvalidParameter {
                param: arg.to_string(),
                reason: "empty parameter name".to_string(),
            });
        }
        if params.contains_key(&name) {
            return Err(OpsError::InvalidParameter {
                param: name,
                reason: "given more than once".to_string(),
            });
        }
        params.insert(name, value);
    }

    Ok(params)
}
