//! Lenient query-string coercion: a missing or unparsable value falls
//! back to a caller-supplied default rather than rejecting the request,
//! matching the original's permissive `ToInt64` conversion helper.

use std::collections::HashMap;

/// Whether `key` was supplied at all with a non-empty value, the way the
/// original checks `p.Get("relative") != ""` before deciding to use it.
pub fn present(params: &HashMap<String, String>, key: &str) -> bool {
    params.get(key).is_some_and(|v| !v.is_empty())
}

pub fn get_i64(params: &HashMap<String, String>, key: &str, default: i64) -> i64 {
    params
        .get(key)
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}
