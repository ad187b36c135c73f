//! AST Module - task file types parsed from YAML
//!
//! - `task`: TaskFile, TaskDefinition
//! - `param`: ParamDecl, ParamType
//! - `step`: Step
//! - `tool`: Tool (alias targets)
//!
//! These types are the static "what" of a task. Validation across fields
//! (template references, duplicates) lives in [`crate::registry`]; execution
//! lives in [`crate::runtime`].

mod param;
mod step;
mod task;
mod tool;

pub use param::{ParamDecl, ParamType};
pub use step::Step;
pub use task::{TaskDefinition, TaskFile, SCHEMA_V01};
pub use tool::Tool;
