//! `{{var}}` template interpolation shared by the action executors.
//!
//! Tokens are dotted paths looked up in the run's variables map. Unresolved
//! tokens are left verbatim so a misconfigured flow degrades to visible but
//! wrong text instead of failing the run.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value as JsonValue};

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"\{\{\s*([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
        .expect("token pattern is valid");
}

/// Replace every `{{path}}` token in `template` with its value from
/// `variables`. Missing or null values leave the token untouched.
pub fn render(template: &str, variables: &Map<String, JsonValue>) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures| {
            match lookup_path(variables, &caps[1]) {
                Some(value) if !value.is_null() => value_to_string(value),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Dotted-path lookup into a JSON object map (`customer.address.city`).
pub fn lookup_path<'a>(
    variables: &'a Map<String, JsonValue>,
    path: &str,
) -> Option<&'a JsonValue> {
    let mut parts = path.split('.');
    let mut current = variables.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

/// Render a JSON scalar the way it should appear in human-facing text:
/// strings bare (no quotes), everything else via its JSON form.
pub fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
