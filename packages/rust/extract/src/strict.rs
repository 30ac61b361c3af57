//! Strict pass: clean the wrapping around a JSON payload and decode it.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::OutputShape;

/// Remove code fences and anything outside the outermost brackets.
///
/// The payload starts at whichever of `{` or `[` occurs first and ends at
/// whichever of `}` or `]` occurs last.
pub(crate) fn clean(raw: &str) -> &str {
    let start = raw.find(['{', '[']);
    let end = raw.rfind(['}', ']']);

    match (start, end) {
        (Some(start), Some(end)) if start <= end => raw[start..=end].trim(),
        (Some(start), _) => raw[start..].trim(),
        _ => raw.trim(),
    }
}

fn strip_fences(raw: &str) -> String {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"```(?:json|JSON)?\s*").expect("valid regex"));

    FENCE_RE.replace_all(raw, "").into_owned()
}

/// Decode `raw` as a value of `shape`, or `None` if it is not one.
pub(crate) fn decode(raw: &str, shape: OutputShape) -> Option<Value> {
    let unfenced = strip_fences(raw);
    let candidate = clean(&unfenced);
    if candidate.is_empty() {
        return None;
    }

    let value: Value = serde_json::from_str(candidate).ok()?;

    match (shape, value) {
        // A single object where a list of objects was asked for is still usable.
        (OutputShape::ArrayOfObjects, value @ Value::Object(_)) => {
            Some(Value::Array(vec![value]))
        }
        (shape, value) if shape.matches(&value) => Some(value),
        _ => None,
    }
}
