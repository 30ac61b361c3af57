//! Resilient extraction of structured values from free-form generator text.
//!
//! Generation output carries no format guarantee. [`extract`] first tries a
//! strict JSON decode of the cleaned text and, when that fails, falls back to
//! line- and sentence-level heuristics chosen by the caller's [`Contract`].
//! It never fails: the worst case is an empty array or a `{"summary": ..}`
//! object, tagged [`ExtractionMode::Fallback`].

pub mod fallback;
pub mod insights;
mod strict;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub use fallback::{ListLimits, list_candidates};
pub use insights::{InsightKind, mine};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The kind of structured value a stage expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputShape {
    Object,
    ArrayOfObjects,
    ArrayOfStrings,
}

impl OutputShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::ArrayOfObjects => "arrayOfObjects",
            Self::ArrayOfStrings => "arrayOfStrings",
        }
    }

    /// Whether `value` is of this shape.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Object, Value::Object(_)) => true,
            (Self::ArrayOfObjects, Value::Array(items)) => items.iter().all(Value::is_object),
            (Self::ArrayOfStrings, Value::Array(items)) => items.iter().all(Value::is_string),
            _ => false,
        }
    }

    /// Value used when neither pass produced anything.
    pub fn default_value(&self, raw_text: &str) -> Value {
        match self {
            Self::Object => serde_json::json!({ "summary": raw_text.trim() }),
            Self::ArrayOfObjects | Self::ArrayOfStrings => Value::Array(Vec::new()),
        }
    }
}

impl std::fmt::Display for OutputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an [`Extraction`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Direct JSON decode of the cleaned text.
    Strict,
    /// Heuristic recovery or the shape default.
    Fallback,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heuristic applied when the strict pass fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackStrategy {
    /// Numbered, bulleted or quoted lines as plain strings.
    ListItems(ListLimits),
    /// The same candidates, each wrapped as `{field: text}`.
    ListObjects {
        field: &'static str,
        limits: ListLimits,
    },
    /// Free-text insight mining.
    Insights(InsightKind),
    /// No heuristic; go straight to the shape default.
    ShapeDefault,
}

/// What a stage expects from the generator and how to recover when it
/// does not get it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub shape: OutputShape,
    pub fallback: FallbackStrategy,
}

impl Contract {
    /// A JSON object, degrading to `{"summary": raw}`.
    pub fn object() -> Self {
        Self {
            shape: OutputShape::Object,
            fallback: FallbackStrategy::ShapeDefault,
        }
    }

    /// An array of strings recovered from list lines.
    pub fn string_list(limits: ListLimits) -> Self {
        Self {
            shape: OutputShape::ArrayOfStrings,
            fallback: FallbackStrategy::ListItems(limits),
        }
    }

    /// An array of objects recovered from list lines as `{field: text}`.
    pub fn object_list(field: &'static str, limits: ListLimits) -> Self {
        Self {
            shape: OutputShape::ArrayOfObjects,
            fallback: FallbackStrategy::ListObjects { field, limits },
        }
    }

    /// An array of strings recovered by insight mining.
    pub fn insights(kind: InsightKind) -> Self {
        Self {
            shape: OutputShape::ArrayOfStrings,
            fallback: FallbackStrategy::Insights(kind),
        }
    }
}

/// Result of one extraction. The raw text is always retained.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub value: Value,
    pub mode: ExtractionMode,
    pub raw_text: String,
}

impl Extraction {
    pub fn is_fallback(&self) -> bool {
        self.mode == ExtractionMode::Fallback
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Turn `raw_text` into a value of `contract.shape`. Never fails.
pub fn extract(raw_text: &str, contract: &Contract) -> Extraction {
    if let Some(value) = strict::decode(raw_text, contract.shape) {
        return Extraction {
            value,
            mode: ExtractionMode::Strict,
            raw_text: raw_text.to_string(),
        };
    }

    let value = fallback::recover(raw_text, contract);
    debug!(
        shape = %contract.shape,
        recovered = value.as_array().map_or(1, Vec::len),
        "strict decode failed, used fallback"
    );

    Extraction {
        value,
        mode: ExtractionMode::Fallback,
        raw_text: raw_text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_object_inside_fence_and_prose() {
        let raw = "Here is the analysis:\n```json\n{\"businessType\": \"Tea shop\", \"industry\": \"Food\"}\n```\nLet me know!";
        let out = extract(raw, &Contract::object());
        assert_eq!(out.mode, ExtractionMode::Strict);
        assert_eq!(out.value, json!({"businessType": "Tea shop", "industry": "Food"}));
        assert_eq!(out.raw_text, raw);
    }

    #[test]
    fn strict_array_of_objects() {
        let raw = r#"[{"keyword": "green tea"}, {"keyword": "matcha"}]"#;
        let out = extract(raw, &Contract::object_list("keyword", ListLimits::KEYWORDS));
        assert_eq!(out.mode, ExtractionMode::Strict);
        assert_eq!(out.value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn lone_object_wrapped_for_array_of_objects() {
        let raw = r#"{"keyword": "green tea"}"#;
        let out = extract(raw, &Contract::object_list("keyword", ListLimits::KEYWORDS));
        assert_eq!(out.mode, ExtractionMode::Strict);
        assert_eq!(out.value, json!([{"keyword": "green tea"}]));
    }

    #[test]
    fn wrong_kind_falls_back() {
        // An object is not an array of strings.
        let raw = "{\"a\": 1}\n- first idea here\n- second idea here";
        let out = extract(raw, &Contract::string_list(ListLimits::KEYWORDS));
        assert_eq!(out.mode, ExtractionMode::Fallback);
        assert_eq!(out.value, json!(["first idea here", "second idea here"]));
    }

    #[test]
    fn no_json_no_candidates_gives_defaults() {
        let raw = "I am unable to help with that request today";

        let obj = extract(raw, &Contract::object());
        assert_eq!(obj.mode, ExtractionMode::Fallback);
        assert_eq!(obj.value, json!({"summary": raw}));

        let list = extract(raw, &Contract::string_list(ListLimits::KEYWORDS));
        assert_eq!(list.value, json!([]));
        assert!(list.is_fallback());
    }

    #[test]
    fn fallback_respects_keyword_cap() {
        let raw: String = (1..=50).map(|i| format!("{i}. keyword number {i}\n")).collect();
        let out = extract(&raw, &Contract::object_list("keyword", ListLimits::KEYWORDS));
        assert_eq!(out.mode, ExtractionMode::Fallback);
        let items = out.value.as_array().unwrap();
        assert_eq!(items.len(), 30);
        assert_eq!(items[0], json!({"keyword": "keyword number 1"}));
    }

    #[test]
    fn insight_contract_mines_urls() {
        let raw = "Top pages: https://example.com/blog/tea and https://example.com/shop.";
        let out = extract(raw, &Contract::insights(InsightKind::Urls));
        assert_eq!(out.mode, ExtractionMode::Fallback);
        assert_eq!(
            out.value,
            json!(["https://example.com/blog/tea", "https://example.com/shop"])
        );
    }

    #[test]
    fn shape_matching() {
        assert!(OutputShape::ArrayOfStrings.matches(&json!([])));
        assert!(OutputShape::ArrayOfStrings.matches(&json!(["a", "b"])));
        assert!(!OutputShape::ArrayOfStrings.matches(&json!(["a", 1])));
        assert!(!OutputShape::Object.matches(&json!([{}])));
        assert_eq!(
            serde_json::to_string(&OutputShape::ArrayOfObjects).unwrap(),
            "\"arrayOfObjects\""
        );
    }
}
