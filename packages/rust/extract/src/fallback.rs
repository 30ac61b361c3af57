//! Fallback pass: recover list items from prose, line by line.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::insights;
use crate::{Contract, FallbackStrategy};

/// Length bounds (in characters, inclusive) and item cap for list recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLimits {
    pub min_chars: usize,
    pub max_chars: usize,
    pub cap: usize,
}

impl ListLimits {
    /// Keyword lists: up to 30 phrases.
    pub const KEYWORDS: Self = Self {
        min_chars: 3,
        max_chars: 100,
        cap: 30,
    };

    /// Blog post suggestions: up to 8 titles.
    pub const SUGGESTIONS: Self = Self {
        min_chars: 5,
        max_chars: 100,
        cap: 8,
    };

    /// Keyword variations and other short idea lists.
    pub const SHORT_LIST: Self = Self {
        min_chars: 3,
        max_chars: 100,
        cap: 15,
    };

    pub fn with_cap(self, cap: usize) -> Self {
        Self { cap, ..self }
    }

    fn admits(&self, text: &str) -> bool {
        let len = text.chars().count();
        len >= self.min_chars && len <= self.max_chars
    }
}

/// Apply the contract's fallback strategy, then the shape default if it
/// recovered nothing.
pub(crate) fn recover(raw: &str, contract: &Contract) -> Value {
    let recovered = match &contract.fallback {
        FallbackStrategy::ListItems(limits) => strings(list_candidates(raw, limits)),
        FallbackStrategy::ListObjects { field, limits } => {
            let items: Vec<Value> = list_candidates(raw, limits)
                .into_iter()
                .map(|text| {
                    let mut obj = Map::new();
                    obj.insert((*field).to_string(), Value::String(text));
                    Value::Object(obj)
                })
                .collect();
            Value::Array(items)
        }
        FallbackStrategy::Insights(kind) => strings(insights::mine(raw, *kind)),
        FallbackStrategy::ShapeDefault => Value::Null,
    };

    let empty = match &recovered {
        Value::Array(items) => items.is_empty(),
        Value::Null => true,
        _ => false,
    };

    if empty || !contract.shape.matches(&recovered) {
        contract.shape.default_value(raw)
    } else {
        recovered
    }
}

fn strings(items: Vec<String>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}

/// Collect list-like candidates from `raw`.
///
/// A line qualifies when it starts with `N.`, `N)` or a bullet (`-`, `*`,
/// `•`), or contains quoted text. Quoted text wins over the rest of the
/// line. Markers, bold markup, trailing parentheticals and surrounding
/// quotes are stripped. Results are deduplicated in encounter order.
pub fn list_candidates(raw: &str, limits: &ListLimits) -> Vec<String> {
    static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s*").expect("valid regex")
    });
    static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#""([^"]+)"|“([^”]+)”"#).expect("valid regex")
    });

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for line in raw.lines() {
        if out.len() >= limits.cap {
            break;
        }

        let line = line.replace("**", "");
        let quoted = QUOTED_RE
            .captures(&line)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().to_string());

        let candidate = match quoted {
            Some(text) => text,
            None => match MARKER_RE.find(&line) {
                Some(marker) => strip_annotation(&line[marker.end()..]),
                None => continue,
            },
        };

        let candidate = candidate
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .trim_end_matches(':')
            .trim()
            .to_string();

        if !limits.admits(&candidate) {
            continue;
        }
        if seen.insert(candidate.clone()) {
            out.push(candidate);
        }
    }

    out
}

/// Drop a trailing `(...)` note or ` - explanation` from a list item.
fn strip_annotation(text: &str) -> String {
    let text = match text.find('(') {
        Some(idx) if idx > 0 => &text[..idx],
        _ => text,
    };
    let text = match text.find(" - ") {
        Some(idx) if idx > 0 => &text[..idx],
        _ => text,
    };
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InsightKind, OutputShape};
    use serde_json::json;

    #[test]
    fn numbered_bulleted_and_quoted_lines() {
        let raw = "Here are some keywords:\n\
                   1. **organic green tea** (high volume)\n\
                   2) matcha latte recipe - trending\n\
                   - loose leaf tea\n\
                   * tea gift sets\n\
                   • herbal tea benefits\n\
                   Consider \"best tea for sleep\" as well.\n\
                   Plain sentence without markers.";
        let got = list_candidates(raw, &ListLimits::KEYWORDS);
        assert_eq!(
            got,
            vec![
                "organic green tea",
                "matcha latte recipe",
                "loose leaf tea",
                "tea gift sets",
                "herbal tea benefits",
                "best tea for sleep",
            ]
        );
    }

    #[test]
    fn length_bounds_and_dedup() {
        let long = "x".repeat(101);
        let raw = format!("- ab\n- tea\n- tea\n- {long}\n- \"tea\"");
        let got = list_candidates(&raw, &ListLimits::KEYWORDS);
        assert_eq!(got, vec!["tea"]);
    }

    #[test]
    fn cap_applies() {
        let raw: String = (0..20).map(|i| format!("- suggestion {i}\n")).collect();
        assert_eq!(list_candidates(&raw, &ListLimits::SUGGESTIONS).len(), 8);
        assert_eq!(
            list_candidates(&raw, &ListLimits::SUGGESTIONS.with_cap(3)).len(),
            3
        );
    }

    #[test]
    fn object_list_wraps_field() {
        let contract = Contract::object_list("keyword", ListLimits::KEYWORDS);
        let got = recover("1. tea kettle\n2. tea cups", &contract);
        assert_eq!(got, json!([{"keyword": "tea kettle"}, {"keyword": "tea cups"}]));
    }

    #[test]
    fn empty_recovery_uses_shape_default() {
        let contract = Contract::insights(InsightKind::Urls);
        assert_eq!(recover("nothing to see", &contract), json!([]));

        let contract = Contract {
            shape: OutputShape::Object,
            fallback: FallbackStrategy::ListItems(ListLimits::KEYWORDS),
        };
        // A list can never satisfy an object shape.
        assert_eq!(
            recover("- a thing", &contract),
            json!({"summary": "- a thing"})
        );
    }
}
