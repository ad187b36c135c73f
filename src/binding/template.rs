//! Template Resolution - `{{param.name}}` and `{{steps.id}}` substitution
//!
//! Two namespaces:
//! - `{{param.NAME}}`: a bound task parameter
//! - `{{steps.ID}}`: the value produced by an earlier step
//!
//! Any other `{{...}}` is a parse error, so typos fail at load time instead
//! of reaching a command line. A literal `{{` is written `{{{{`, which lets
//! arguments such as Go templates (`--format {{{{.State}}`) pass through.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{OpsError, Result};
use crate::util::jsonpath::value_to_text;

use super::params::ParamBindings;

/// Pre-compiled regex for {{param.name}} or {{steps.id}}
static REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(param|steps)\.([A-Za-z0-9_-]+)\s*\}\}").unwrap()
});

/// Escape for a literal `{{`
const ESCAPED_OPEN: &str = "{{{{";

/// A reference found in a template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Param(String),
    Step(String),
}

/// Parsed template fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Literal(&'a str),
    Ref(Reference),
}

/// Values available while resolving a step's templates
pub struct TemplateContext<'a> {
    params: &'a ParamBindings,
    steps: &'a FxHashMap<String, Value>,
}

impl<'a> TemplateContext<'a> {
    pub fn new(params: &'a ParamBindings, steps: &'a FxHashMap<String, Value>) -> Self {
        Self { params, steps }
    }
}

/// Split a template into literals and references
pub fn parse(template: &str) -> Result<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut offset = 0;

    for (i, chunk) in template.split(ESCAPED_OPEN).enumerate() {
        if i > 0 {
            tokens.push(Token::Literal("{{"));
        }
        parse_chunk(chunk, offset, &mut tokens)?;
        offset += chunk.len() + ESCAPED_OPEN.len();
    }

    Ok(tokens)
}

/// Parse text free of escapes; `offset` is its position in the template
fn parse_chunk<'a>(template: &'a str, offset: usize, tokens: &mut Vec<Token<'a>>) -> Result<()> {
    let mut last_end = 0;

    for cap in REF_RE.captures_iter(template) {
        let Some(m) = cap.get(0) else { continue };
        push_literal(template, offset, last_end, m.start(), tokens)?;

        let name = cap[2].to_string();
        let reference = match &cap[1] {
            "param" => Reference::Param(name),
            _ => Reference::Step(name),
        };
        tokens.push(Token::Ref(reference));
        last_end = m.end();
    }
    push_literal(template, offset, last_end, template.len(), tokens)
}

fn push_literal<'a>(
    template: &'a str,
    offset: usize,
    start: usize,
    end: usize,
    tokens: &mut Vec<Token<'a>>,
) -> Result<()> {
    if start == end {
        return Ok(());
    }
    let literal = &template[start..end];
    if let Some(pos) = literal.find("{{") {
        let rest = &literal[pos..];
        let snippet = rest.find("}}").map_or(rest, |close| &rest[..close + 2]);
        return Err(OpsError::TemplateParse {
            position: offset + start + pos,
            details: format!("unrecognized reference '{}'", snippet),
        });
    }
    tokens.push(Token::Literal(literal));
    Ok(())
}

/// All references in a template, in order of appearance
pub fn references(template: &str) -> Result<Vec<Reference>> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|t| match t {
            Token::Ref(r) => Some(r),
            Token::Literal(_) => None,
        })
        .collect())
}

/// Resolve all references in `template`
///
/// Returns `Cow::Borrowed` when there is nothing to substitute.
pub fn resolve<'a>(template: &'a str, ctx: &TemplateContext<'_>) -> Result<Cow<'a, str>> {
    if !template.contains("{{") {
        return Ok(Cow::Borrowed(template));
    }

    let mut result = String::with_capacity(template.len() + 64);
    for token in parse(template)? {
        match token {
            Token::Literal(text) => result.push_str(text),
            Token::Ref(Reference::Param(name)) => {
                let value = ctx.params.get(&name).ok_or_else(|| OpsError::Template {
                    template: template.to_string(),
                    reason: format!("parameter '{}' is not bound", name),
                })?;
                result.push_str(value);
            }
            Token::Ref(Reference::Step(id)) => {
                let value = ctx.steps.get(&id).ok_or_else(|| OpsError::Template {
                    template: template.to_string(),
                    reason: format!("step '{}' produced no value", id),
                })?;
                result.push_str(&value_to_text(value));
            }
        }
    }

    Ok(Cow::Owned(result))
}
