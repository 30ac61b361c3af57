//! Lenient accessors over model-produced JSON.
//!
//! Models drift: numbers arrive as strings, lists as comma-separated text,
//! keys go missing. These helpers take whatever is there and never fail.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

/// Trimmed, non-blank string at `key`. Numbers and booleans are stringified.
pub fn text(value: &Value, key: &str) -> Option<String> {
    let s = match value.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

pub fn text_or(value: &Value, key: &str, default: &str) -> String {
    text(value, key).unwrap_or_else(|| default.to_string())
}

/// String list at `key`: an array (strings, or objects carrying one of the
/// usual name fields) or a comma-separated string.
pub fn list(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(v) => list_of(v),
        None => Vec::new(),
    }
}

pub fn list_of(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(_) => ["keyword", "name", "topic", "title", "url"]
                    .iter()
                    .find_map(|k| text(item, k)),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Non-negative integer at `key`; numeric strings and floats are accepted.
pub fn number(value: &Value, key: &str) -> Option<u64> {
    match value.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f.round() as u64),
        _ => None,
    }
}

pub fn flag(value: &Value, key: &str) -> Option<bool> {
    match value.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Array at `key`, or an empty slice.
pub fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Host of `url` without a leading `www.`; the input itself when it does not
/// parse.
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|h| h.trim_start_matches("www.").to_string())
        .unwrap_or_else(|| url.to_string())
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Lowercase ASCII slug: alphanumerics kept, runs of anything else become a
/// single `-`, no leading or trailing `-`.
pub fn slugify(text: &str) -> String {
    static NON_ALNUM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

    let lower = text.to_lowercase();
    NON_ALNUM_RE
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Slug of the first candidate that slugifies to something. When none does
/// (non-Latin titles), `post-` plus a short hash of the first non-blank
/// candidate, so the slug is never empty and stays stable across runs.
pub fn slug_from(candidates: &[&str]) -> String {
    if let Some(slug) = candidates.iter().map(|c| slugify(c)).find(|s| !s.is_empty()) {
        return slug;
    }
    let seed = candidates
        .iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty())
        .unwrap_or("post");
    let digest = format!("{:x}", Sha256::digest(seed.as_bytes()));
    format!("post-{}", &digest[..8])
}

/// Case-insensitive dedupe preserving first occurrence.
pub fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect()
}
