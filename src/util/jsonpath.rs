//! JSONPath - structured extraction from tool output
//!
//! Supports:
//! - `$.a.b.c` (dot notation), `a.b.c` (without `$` prefix), `$` (root)
//! - `$.a[0].b` and `$.a.0.b` (array index)
//! - `$['key.with.dots']` (quoted field)
//! - `$.a[*].b` and `$.a.*` (wildcard over array elements or object values)
//! - `$.a[?(@.b.c == 'x')]` (equality filter, also `!=`; string/number/bool/null literals)
//!
//! Does NOT support:
//! - Slices: `$.a[0:5]`
//! - Recursive descent: `$..a`
//! - Functions or boolean operators inside filters
//!
//! No-match policy: a *definite* path (fields and indices only) that matches
//! nothing is [`OpsError::PathNotFound`]. An *indefinite* path (wildcard or
//! filter) always yields an array of matches, possibly empty.

use serde_json::Value;

use crate::error::{OpsError, Result};

/// A parsed JSONPath segment
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Object field access: `.field` or `['field']`
    Field(String),
    /// Array index access: `[0]`
    Index(usize),
    /// Every element/value: `[*]`
    Wildcard,
    /// Elements/values matching a predicate: `[?(@.x == 1)]`
    Filter(Filter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

/// Filter predicate `@<path> <op> <literal>`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub path: Vec<Segment>,
    pub op: CompareOp,
    pub value: Value,
}

impl Filter {
    fn matches(&self, candidate: &Value) -> bool {
        let found = select(candidate, &self.path).into_iter().next();
        match self.op {
            CompareOp::Eq => found == Some(&self.value),
            CompareOp::Ne => found != Some(&self.value),
        }
    }
}

/// Parse a JSONPath string into segments
///
/// Examples:
/// - "$.result.deploy_hash" → [Field("result"), Field("deploy_hash")]
/// - "items[0].name" → [Field("items"), Index(0), Field("name")]
pub fn parse(path: &str) -> Result<Vec<Segment>> {
    parse_segments(path.trim()).map_err(|reason| OpsError::JsonPathUnsupported {
        path: path.to_string(),
        reason,
    })
}

/// True if the path selects at most one value (no wildcard or filter)
pub fn is_definite(segments: &[Segment]) -> bool {
    segments
        .iter()
        .all(|s| matches!(s, Segment::Field(_) | Segment::Index(_)))
}

/// Apply segments to a value, returning every match in document order
pub fn select<'v>(root: &'v Value, segments: &[Segment]) -> Vec<&'v Value> {
    let mut current = vec![root];

    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            match segment {
                Segment::Field(name) => next.extend(value.get(name.as_str())),
                Segment::Index(idx) => next.extend(value.get(*idx)),
                Segment::Wildcard => next.extend(children(value)),
                Segment::Filter(filter) => {
                    next.extend(children(value).filter(|child| filter.matches(child)))
                }
            }
        }
        current = next;
    }

    current
}

/// Resolve a path against an already-parsed value, applying the no-match policy
pub fn resolve(value: &Value, path: &str) -> Result<Value> {
    let segments = parse(path)?;
    collect(value, &segments, path)
}

/// Parse `text` as JSON and resolve `path` against it
///
/// Malformed text is always [`OpsError::ParseError`], never an empty result.
pub fn extract(text: &str, path: &str) -> Result<Value> {
    let segments = parse(path)?;
    let value: Value = serde_json::from_str(text).map_err(|e| OpsError::ParseError {
        details: e.to_string(),
    })?;
    collect(&value, &segments, path)
}

/// Render a value for use as a command argument or CLI output
///
/// Strings are emitted raw (no quotes); everything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn collect(value: &Value, segments: &[Segment], path: &str) -> Result<Value> {
    let matches = select(value, segments);

    if is_definite(segments) {
        matches
            .first()
            .map(|v| (*v).clone())
            .ok_or_else(|| OpsError::PathNotFound {
                path: path.to_string(),
            })
    } else {
        Ok(Value::Array(matches.into_iter().cloned().collect()))
    }
}

fn children(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(map) => Box::new(map.values()),
        _ => Box::new(std::iter::empty()),
    }
}

// ═══════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════

fn parse_segments(path: &str) -> std::result::Result<Vec<Segment>, String> {
    if path.is_empty() {
        return Err("empty path".to_string());
    }

    let mut segments = Vec::new();
    let mut rest = path;

    if let Some(after) = rest.strip_prefix('$') {
        if !(after.is_empty() || after.starts_with('.') || after.starts_with('[')) {
            return Err("expected '.' or '[' after '$'".to_string());
        }
        rest = after;
    } else if !rest.starts_with('[') && !rest.starts_with('.') {
        // Bare leading name: "a.b" is "$.a.b"
        let (name, after) = take_name(rest);
        segments.push(name_segment(name)?);
        rest = after;
    }

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            if after.starts_with('.') {
                return Err("recursive descent '..' is not supported".to_string());
            }
            if let Some(after) = after.strip_prefix('*') {
                segments.push(Segment::Wildcard);
                rest = after;
                continue;
            }
            let (name, after) = take_name(after);
            segments.push(name_segment(name)?);
            rest = after;
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = closing_bracket(after).ok_or_else(|| "unclosed '['".to_string())?;
            segments.push(parse_bracket(after[..end].trim())?);
            rest = &after[end + 1..];
        } else {
            return Err(format!("unexpected '{}'", rest));
        }
    }

    Ok(segments)
}

fn take_name(s: &str) -> (&str, &str) {
    let end = s.find(['.', '[']).unwrap_or(s.len());
    (&s[..end], &s[end..])
}

fn name_segment(name: &str) -> std::result::Result<Segment, String> {
    if name.is_empty() {
        return Err("empty segment".to_string());
    }
    if name.bytes().all(|b| b.is_ascii_digit()) {
        // "items.0" is "items[0]"
        let index = name.parse().map_err(|_| format!("index '{}' out of range", name))?;
        return Ok(Segment::Index(index));
    }
    Ok(Segment::Field(name.to_string()))
}

/// Position of the `]` closing a bracket, skipping quoted text
fn closing_bracket(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in s.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, ']') => return Some(i),
            (None, _) => {}
        }
    }
    None
}

fn parse_bracket(inner: &str) -> std::result::Result<Segment, String> {
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    if let Some(expr) = inner.strip_prefix('?') {
        let body = expr
            .trim()
            .strip_prefix('(')
            .and_then(|e| e.strip_suffix(')'))
            .ok_or_else(|| "filter must be written as ?(...)".to_string())?;
        return parse_filter(body.trim()).map(Segment::Filter);
    }
    if let Some(field) = unquote(inner) {
        return Ok(Segment::Field(field.to_string()));
    }
    if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
        let index = inner
            .parse()
            .map_err(|_| format!("index '{}' out of range", inner))?;
        return Ok(Segment::Index(index));
    }
    Err(format!("unsupported bracket expression '[{}]'", inner))
}

fn parse_filter(body: &str) -> std::result::Result<Filter, String> {
    let lhs_rhs = body
        .strip_prefix('@')
        .ok_or_else(|| "filter must start with '@'".to_string())?;

    let (op, pos) = match (lhs_rhs.find("=="), lhs_rhs.find("!=")) {
        (Some(eq), Some(ne)) if ne < eq => (CompareOp::Ne, ne),
        (Some(eq), _) => (CompareOp::Eq, eq),
        (None, Some(ne)) => (CompareOp::Ne, ne),
        (None, None) => return Err("filter needs '==' or '!='".to_string()),
    };

    let lhs = lhs_rhs[..pos].trim();
    let rhs = lhs_rhs[pos + 2..].trim();

    let path = if lhs.is_empty() {
        Vec::new()
    } else {
        parse_segments(&format!("${}", lhs))?
    };
    if !is_definite(&path) {
        return Err("filter paths must not contain wildcards or filters".to_string());
    }

    let value = match unquote(rhs) {
        Some(s) => Value::String(s.to_string()),
        None => match serde_json::from_str::<Value>(rhs) {
            Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => v,
            _ => return Err(format!("unsupported filter literal '{}'", rhs)),
        },
    };

    Ok(Filter { path, op, value })
}

fn unquote(s: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|q| {
        s.strip_prefix(q)
            .and_then(|inner| inner.strip_suffix(q))
            .filter(|inner| !inner.contains(q))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn field(s: &str) -> Segment {
        Segment::Field(s.to_string())
    }

    #[test]
    fn extract_deploy_hash() {
        let value = extract(r#"{"result":{"deploy_hash":"abc123"}}"#, "result.deploy_hash").unwrap();
        assert_eq!(value, json!("abc123"));

        let value = extract(r#"{"result":{"deploy_hash":"abc123"}}"#, "$.result.deploy_hash").unwrap();
        assert_eq!(value, json!("abc123"));
    }

    #[test]
    fn malformed_text_is_parse_error() {
        let err = extract(r#"{"result": {"deploy_hash": "#, "$.result").unwrap_err();
        assert!(matches!(err, OpsError::ParseError { .. }));

        let err = extract("", "$.result").unwrap_err();
        assert!(matches!(err, OpsError::ParseError { .. }));

        let err = extract("Error: connection refused", "$").unwrap_err();
        assert!(matches!(err, OpsError::ParseError { .. }));
    }

    #[test]
    fn definite_miss_is_path_not_found() {
        let err = extract(r#"{"result":{}}"#, "$.result.deploy_hash").unwrap_err();
        assert!(matches!(err, OpsError::PathNotFound { ref path } if path == "$.result.deploy_hash"));
    }

    #[test]
    fn null_value_is_a_match() {
        let value = extract(r#"{"a":null}"#, "$.a").unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn parse_simple_path() {
        assert_eq!(parse("$.a.b.c").unwrap(), vec![field("a"), field("b"), field("c")]);
        assert_eq!(parse("a.b").unwrap(), vec![field("a"), field("b")]);
        assert!(parse("$").unwrap().is_empty());
    }

    #[test]
    fn parse_indices() {
        let expected = vec![field("items"), Segment::Index(0), field("name")];
        assert_eq!(parse("$.items[0].name").unwrap(), expected);
        assert_eq!(parse("items.0.name").unwrap(), expected);
        assert_eq!(parse("$[1]").unwrap(), vec![Segment::Index(1)]);
    }

    #[test]
    fn parse_quoted_field() {
        assert_eq!(parse("$['a.b'].c").unwrap(), vec![field("a.b"), field("c")]);
        assert_eq!(parse(r#"$["x"]"#).unwrap(), vec![field("x")]);
    }

    #[test]
    fn parse_rejects_unsupported() {
        for path in ["", "$x", "$.a[0:5]", "$..a", "$.a.", "$.a[", "$.a[?(@.b)]", "$.a[?(@.b == x)]"] {
            let err = parse(path).unwrap_err();
            assert!(
                matches!(err, OpsError::JsonPathUnsupported { .. }),
                "expected unsupported for {:?}",
                path
            );
        }
    }

    #[test]
    fn wildcard_flattens_host_ips() {
        let inventory = json!({
            "Reservations": [
                {"Instances": [
                    {"PublicIpAddress": "10.0.0.1"},
                    {"PublicIpAddress": "10.0.0.2"}
                ]},
                {"Instances": [
                    {"PublicIpAddress": "10.0.0.3"},
                    {"State": {"Name": "stopped"}}
                ]}
            ]
        });

        let ips = resolve(&inventory, "$.Reservations[*].Instances[*].PublicIpAddress").unwrap();
        assert_eq!(ips, json!(["10.0.0.1", "10.0.0.2", "10.0.0.3"]));
    }

    #[test]
    fn wildcard_without_matches_is_empty_list() {
        let ips = resolve(&json!({"Reservations": []}), "$.Reservations[*].Instances[*].PublicIpAddress")
            .unwrap();
        assert_eq!(ips, json!([]));
    }

    #[test]
    fn wildcard_over_object_values() {
        let value = json!({"a": {"n": 1}, "b": {"n": 2}});
        assert_eq!(resolve(&value, "$.*.n").unwrap(), json!([1, 2]));
    }

    #[test]
    fn filter_on_tag() {
        let instances = json!({
            "Instances": [
                {"Tags": {"role": "validator"}, "PublicIpAddress": "1.1.1.1"},
                {"Tags": {"role": "bootstrap"}, "PublicIpAddress": "2.2.2.2"},
                {"Tags": {"role": "validator"}, "PublicIpAddress": "3.3.3.3"}
            ]
        });

        let ips = resolve(&instances, "$.Instances[?(@.Tags.role == 'validator')].PublicIpAddress").unwrap();
        assert_eq!(ips, json!(["1.1.1.1", "3.3.3.3"]));

        let ips = resolve(&instances, r#"$.Instances[?(@.Tags.role != "validator")].PublicIpAddress"#).unwrap();
        assert_eq!(ips, json!(["2.2.2.2"]));
    }

    #[test]
    fn filter_literal_with_brackets_and_numbers() {
        let value = json!({"xs": [{"k": "a]b", "n": 1}, {"k": "c", "n": 2}]});
        assert_eq!(resolve(&value, "$.xs[?(@.k == 'a]b')].n").unwrap(), json!([1]));
        assert_eq!(resolve(&value, "$.xs[?(@.n == 2)].k").unwrap(), json!(["c"]));
    }

    #[test]
    fn value_to_text_strips_string_quotes() {
        assert_eq!(value_to_text(&json!("abc")), "abc");
        assert_eq!(value_to_text(&json!(42)), "42");
        assert_eq!(value_to_text(&json!(["a", "b"])), r#"["a","b"]"#);
    }
}
