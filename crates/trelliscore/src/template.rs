//! `{{path.to.key}}` placeholder substitution.

use crate::value::{lookup_path, render};
use crate::Payload;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"))
}

/// Replace every `{{path}}` in `template` with the value found at `path` in `data`.
///
/// Paths are trimmed before lookup. Placeholders that do not resolve are
/// left verbatim, so interpolating twice against the same data is a no-op.
pub fn interpolate(template: &str, data: &Payload) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    placeholder()
        .replace_all(template, |caps: &Captures| match lookup_path(data, caps[1].trim()) {
            Some(value) => render(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Interpolate every string inside `value`, recursing through arrays and objects.
pub fn interpolate_value(value: &Value, data: &Payload) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(s, data)),
        Value::Array(items) => Value::Array(items.iter().map(|v| interpolate_value(v, data)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, data)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Placeholder paths referenced by `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    placeholder()
        .captures_iter(template)
        .map(|caps| caps[1].trim().to_string())
        .collect()
}
