//! Variable resolver: `{{ path }}` template expansion against an
//! execution context.
//!
//! See §4.2. A template occurrence is `{{`, optional whitespace, a
//! dot-separated path, optional whitespace, `}}`. The first path segment
//! selects a scope (`$node`, `$vars`, `$error`, or an implicit alias for
//! `$node`); the remaining segments descend into the scoped value.

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::node::NodeId;
use regex::Regex;
use serde_json::{Map, Value};

/// Matches one `{{ ... }}` occurrence anywhere in a string.
fn template_regex() -> Regex {
    Regex::new(r"\{\{\s*([^}]+?)\s*\}\}").expect("static pattern is valid")
}

/// Matches a string that is *entirely* a single template occurrence, with
/// nothing else around it.
fn full_template_regex() -> Regex {
    Regex::new(r"^\{\{\s*([^}]+?)\s*\}\}$").expect("static pattern is valid")
}

/// Splits a path expression into its segments, stripping quotes and
/// brackets so that `a["b"]` and `a.b` resolve identically.
fn tokenize(path: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = path.trim().chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                let mut inner = String::new();
                for c2 in chars.by_ref() {
                    if c2 == ']' {
                        break;
                    }
                    inner.push(c2);
                }
                tokens.push(strip_quotes(inner.trim()));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn strip_quotes(segment: &str) -> String {
    let trimmed = segment.trim();
    if trimmed.len() >= 2 {
        let bytes = trimmed.as_bytes();
        let first = bytes[0];
        let last = bytes[trimmed.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

/// Descends through a JSON mapping one segment at a time.
fn descend(mut cursor: Value, segments: &[String], original: &str) -> Result<Value, EngineError> {
    for segment in segments {
        cursor = match cursor {
            Value::Object(ref map) => map
                .get(segment)
                .cloned()
                .ok_or_else(|| unresolved(original))?,
            _ => return Err(unresolved(original)),
        };
    }
    Ok(cursor)
}

fn unresolved(path: &str) -> EngineError {
    EngineError::UnresolvedVariable(path.to_string())
}

/// Resolves a single `{{ ... }}` expression (without the delimiters)
/// against the context.
fn resolve_expression(expr: &str, ctx: &ExecutionContext) -> Result<Value, EngineError> {
    let tokens = tokenize(expr);
    let Some(head) = tokens.first() else {
        return Err(unresolved(expr));
    };

    match head.as_str() {
        "$node" => {
            let node_id = tokens.get(1).ok_or_else(|| unresolved(expr))?;
            let value = ctx
                .results
                .get(&NodeId::new(node_id.clone()))
                .cloned()
                .ok_or_else(|| unresolved(expr))?;
            descend(value, &tokens[2..], expr)
        }
        "$vars" => {
            let name = tokens.get(1).ok_or_else(|| unresolved(expr))?;
            let value = ctx
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| unresolved(expr))?;
            descend(value, &tokens[2..], expr)
        }
        "$error" => Err(EngineError::UnresolvedVariable(format!(
            "{expr}: $error scope is reserved and not implemented"
        ))),
        alias => {
            let value = ctx
                .results
                .get(&NodeId::new(alias.to_string()))
                .cloned()
                .ok_or_else(|| unresolved(expr))?;
            descend(value, &tokens[1..], expr)
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Expands all `{{ ... }}` templates in `value` against `ctx`, producing an
/// isomorphic JSON value.
///
/// If the entire string is a single template occurrence, the looked-up
/// value is returned with its original type. Otherwise templates are
/// stringified and interpolated into the surrounding literal text.
pub fn resolve(value: &Value, ctx: &ExecutionContext) -> Result<Value, EngineError> {
    match value {
        Value::String(s) => resolve_string(s, ctx),
        Value::Array(items) => {
            let resolved = items
                .iter()
                .map(|item| resolve(item, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(resolved))
        }
        Value::Object(map) => {
            let mut resolved = Map::with_capacity(map.len());
            for (key, val) in map {
                resolved.insert(key.clone(), resolve(val, ctx)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_string(s: &str, ctx: &ExecutionContext) -> Result<Value, EngineError> {
    if let Some(captures) = full_template_regex().captures(s) {
        let expr = captures.get(1).expect("capture group 1 exists").as_str();
        return resolve_expression(expr, ctx);
    }

    let re = template_regex();
    if !re.is_match(s) {
        return Ok(Value::String(s.to_string()));
    }

    let mut first_err = None;
    let rewritten = re.replace_all(s, |captures: &regex::Captures<'_>| {
        let expr = captures.get(1).expect("capture group 1 exists").as_str();
        match resolve_expression(expr, ctx) {
            Ok(value) => stringify(&value),
            Err(err) => {
                if first_err.is_none() {
                    first_err = Some(err);
                }
                String::new()
            }
        }
    });

    if let Some(err) = first_err {
        return Err(err);
    }
    Ok(Value::String(rewritten.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use silver_telegram_core::{ExecutionId, WorkflowId};

    fn ctx_with_var(name: &str, value: Value) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(WorkflowId::new(), ExecutionId::new(), Value::Null);
        ctx.variables.insert(name.to_string(), value);
        ctx
    }

    #[test]
    fn literal_without_templates_is_identity() {
        let ctx = ctx_with_var("x", json!(1));
        let value = json!({"a": 1, "b": [true, "hi", null]});
        assert_eq!(resolve(&value, &ctx).unwrap(), value);
    }

    #[test]
    fn full_template_preserves_type() {
        let ctx = ctx_with_var("x", json!({"nested": 42}));
        let resolved = resolve(&json!("{{ $vars.x }}"), &ctx).unwrap();
        assert_eq!(resolved, json!({"nested": 42}));
    }

    #[test]
    fn partial_template_stringifies_value() {
        let ctx = ctx_with_var("x", json!(42));
        let resolved = resolve(&json!("prefix {{ $vars.x }}"), &ctx).unwrap();
        assert_eq!(resolved, json!("prefix 42"));
    }

    #[test]
    fn node_scope_descends_nested_fields() {
        let mut ctx = ExecutionContext::new(WorkflowId::new(), ExecutionId::new(), Value::Null);
        ctx.results.insert(
            NodeId::new("n"),
            json!({"body": {"foo": "bar"}}),
        );
        let resolved = resolve(&json!("{{ $node.n.body.foo }}"), &ctx).unwrap();
        assert_eq!(resolved, json!("bar"));
    }

    #[test]
    fn bracket_and_dot_notation_are_equivalent() {
        let mut ctx = ExecutionContext::new(WorkflowId::new(), ExecutionId::new(), Value::Null);
        ctx.results
            .insert(NodeId::new("n"), json!({"body": {"foo": "bar"}}));
        let dotted = resolve(&json!("{{ $node.n.body.foo }}"), &ctx).unwrap();
        let bracketed = resolve(&json!(r#"{{ $node.n["body"]["foo"] }}"#), &ctx).unwrap();
        assert_eq!(dotted, bracketed);
    }

    #[test]
    fn implicit_node_alias_matches_explicit_scope() {
        let mut ctx = ExecutionContext::new(WorkflowId::new(), ExecutionId::new(), Value::Null);
        ctx.results.insert(NodeId::new("n"), json!("value"));
        let aliased = resolve(&json!("{{ n }}"), &ctx).unwrap();
        assert_eq!(aliased, json!("value"));
    }

    #[test]
    fn missing_path_is_unresolved_variable() {
        let ctx = ExecutionContext::new(WorkflowId::new(), ExecutionId::new(), Value::Null);
        let err = resolve(&json!("{{ $vars.missing }}"), &ctx).unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedVariable(_)));
    }

    #[test]
    fn traversal_through_non_mapping_is_unresolved() {
        let ctx = ctx_with_var("x", json!(5));
        let err = resolve(&json!("{{ $vars.x.y }}"), &ctx).unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedVariable(_)));
    }

    #[test]
    fn error_scope_is_always_unresolved() {
        let ctx = ExecutionContext::new(WorkflowId::new(), ExecutionId::new(), Value::Null);
        let err = resolve(&json!("{{ $error.message }}"), &ctx).unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedVariable(_)));
    }
}
