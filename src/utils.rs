/// Utility functions
use serde_json::Value;

/// Read a string field from a JSON object, defaulting to an empty string.
///
/// Missing keys, `null`, and non-string values all yield `""` so that one bad
/// field never fails the whole record.
pub fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

/// Remove every line break from a string.
pub fn strip_newlines(s: &str) -> String {
    s.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

/// Treat an empty string as absent.
pub fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
