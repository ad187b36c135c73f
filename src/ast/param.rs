//! Parameter declarations

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OpsError, Result};

/// Declared type of a parameter value
///
/// Values always travel as strings; the type only constrains what is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Path,
}

impl ParamType {
    /// Check that `value` is acceptable for this type
    pub fn check(self, param: &str, value: &str) -> Result<()> {
        match self {
            ParamType::String => Ok(()),
            ParamType::Integer => value.trim().parse::<i64>().map(|_| ()).map_err(|_| {
                OpsError::InvalidParameter {
                    param: param.to_string(),
                    reason: format!("expected an integer, got '{}'", value),
                }
            }),
            ParamType::Path if value.is_empty() => Err(OpsError::InvalidParameter {
                param: param.to_string(),
                reason: "path must not be empty".to_string(),
            }),
            ParamType::Path => Ok(()),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Path => "path",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ParamType,
    /// Explicit required flag; when absent, a parameter is required unless it has a default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamType::String,
            required: None,
            default: None,
            description: None,
        }
    }

    /// A parameter with a default is never missing
    pub fn is_required(&self) -> bool {
        self.default.is_none() && self.required.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_by_default() {
        assert!(ParamDecl::new("amount").is_required());
    }

    #[test]
    fn default_makes_optional() {
        let mut decl = ParamDecl::new("ttl");
        decl.default = Some("1hour".into());
        assert!(!decl.is_required());

        decl.required = Some(true);
        assert!(!decl.is_required());
    }

    #[test]
    fn explicit_optional() {
        let mut decl = ParamDecl::new("note");
        decl.required = Some(false);
        assert!(!decl.is_required());
    }

    #[test]
    fn integer_check() {
        assert!(ParamType::Integer.check("gas", "10").is_ok());
        assert!(ParamType::Integer.check("gas", "-3").is_ok());
        let err = ParamType::Integer.check("gas", "ten").unwrap_err();
        assert!(matches!(err, OpsError::InvalidParameter { ref param, .. } if param == "gas"));
    }

    #[test]
    fn path_must_not_be_empty() {
        assert!(ParamType::Path.check("key", "keys/secret_key.pem").is_ok());
        assert!(ParamType::Path.check("key", "").is_err());
    }

    #[test]
    fn type_parses_lowercase() {
        let decl: ParamDecl = serde_yaml::from_str("name: n\ntype: integer").unwrap();
        assert_eq!(decl.kind, ParamType::Integer);
        assert_eq!(decl.kind.to_string(), "integer");
    }
}
