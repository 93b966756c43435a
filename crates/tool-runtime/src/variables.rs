//! `{{path}}` template references inside JSON tool arguments.
//!
//! Resolution happens in two steps: [`validate_variable_refs`] reports every
//! reference that does not resolve, then [`resolve_variables`] substitutes.
//! A string that is exactly one reference keeps the referenced value's type;
//! a reference embedded in other text is interpolated into a string.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

static VARIABLE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("variable ref regex"));

static WHOLE_VARIABLE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{([^}]+)\}\}$").expect("whole variable ref regex"));

/// True iff `value` is a string holding at least one `{{path}}` reference.
pub fn contains_variable_ref(value: &Value) -> bool {
    match value {
        Value::String(s) => str_contains_variable_ref(s),
        _ => false,
    }
}

pub fn str_contains_variable_ref(s: &str) -> bool {
    VARIABLE_REF.is_match(s)
}

/// Walk a dot-separated path through `variables`.
///
/// Returns `None` as soon as a segment is missing or the current value cannot
/// be descended into. Numeric segments index arrays.
pub fn resolve_variable_path<'a>(path: &str, variables: &'a Map<String, Value>) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    let mut segments = path.split('.');
    let first = segments.next()?;
    if first.is_empty() {
        return None;
    }
    let mut current = variables.get(first)?;

    for segment in segments {
        if segment.is_empty() {
            return None;
        }
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Replace every `{{path}}` in `s`. Unresolved references stay verbatim.
pub fn resolve_variable_string(s: &str, variables: &Map<String, Value>) -> String {
    VARIABLE_REF
        .replace_all(s, |caps: &Captures<'_>| {
            match resolve_variable_path(&caps[1], variables) {
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Resolve every reference in an arbitrary JSON tree.
pub fn resolve_variables(value: &Value, variables: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => resolve_string_value(s, variables),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_variables(item, variables))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), resolve_variables(item, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_string_value(s: &str, variables: &Map<String, Value>) -> Value {
    if let Some(caps) = WHOLE_VARIABLE_REF.captures(s) {
        return match resolve_variable_path(&caps[1], variables) {
            Some(resolved) => resolved.clone(),
            None => Value::String(s.to_string()),
        };
    }
    if str_contains_variable_ref(s) {
        return Value::String(resolve_variable_string(s, variables));
    }
    Value::String(s.to_string())
}

/// Every distinct reference path in `value`, in first-seen order.
pub fn extract_variable_refs(value: &Value) -> Vec<String> {
    let mut refs = Vec::new();
    collect_refs(value, &mut refs);
    refs
}

fn collect_refs(value: &Value, refs: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for caps in VARIABLE_REF.captures_iter(s) {
                let path = caps[1].trim().to_string();
                if !refs.contains(&path) {
                    refs.push(path);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, refs)),
        Value::Object(map) => map.values().for_each(|item| collect_refs(item, refs)),
        _ => {}
    }
}

/// Paths referenced in `value` that do not resolve. Empty means safe to resolve.
pub fn validate_variable_refs(value: &Value, variables: &Map<String, Value>) -> Vec<String> {
    extract_variable_refs(value)
        .into_iter()
        .filter(|path| resolve_variable_path(path, variables).is_none())
        .collect()
}
