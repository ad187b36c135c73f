//! Binding Module - parameters and templates
//!
//! - `params`: typed binding of caller-supplied parameters (ParamBindings)
//! - `template`: `{{param.name}}` / `{{steps.id}}` substitution
//!
//! Data flow:
//! ```text
//! CLI `--name value` pairs → Params
//!                              ↓
//!              ParamBindings::bind (required / declared / typed)
//!                              ↓
//!        template::resolve per argument (one template → one argv token)
//!                              ↓
//!                     Invocation.args
//! ```
//!
//! Substitution is literal. A value containing spaces, quotes or `;` stays
//! inside the single argument it was substituted into; no shell ever sees it.

mod params;
pub mod template;

pub use params::{parse_cli_params, ParamBindings, Params};
pub use template::{Reference, TemplateContext};
