//! Core domain types shared by the pipeline and its capabilities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// RunInput
// ---------------------------------------------------------------------------

/// Caller-supplied input for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    /// Website the post is written for. Required.
    #[serde(default)]
    pub url: String,
    /// Topic override; wins over every derived topic when non-blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_topic: Option<String>,
    /// Keywords the caller wants targeted in addition to generated ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_keywords: Vec<String>,
}

impl RunInput {
    /// Input for `url` with no overrides.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Capability payloads
// ---------------------------------------------------------------------------

/// What the fetch capability extracts from a web page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteSnapshot {
    pub url: String,
    pub title: String,
    pub description: String,
    /// `h1`..`h3` texts in document order.
    pub headings: Vec<String>,
    /// Whitespace-collapsed visible text, truncated.
    pub text: String,
}

/// Which model family a stage's generation call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Analysis and long-form writing.
    Writer,
    /// Search-grounded research.
    Research,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Writer => "writer",
            Self::Research => "research",
        }
    }
}

impl std::fmt::Display for ModelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call to the generation capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Name of the stage issuing the call. Used for logging and test scripting.
    pub stage: String,
    pub role: ModelRole,
    pub prompt: String,
}

/// Text returned by the generation capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    /// Model that actually served the call, when reported.
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub tokens_in: u64,
    #[serde(default)]
    pub tokens_out: u64,
}

impl Generation {
    /// A generation carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A finished post handed to the publish capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub slug: String,
    /// Markdown body.
    pub body: String,
    /// Free-form metadata (description, keywords, categories, tags, SEO).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Where the publish capability put the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub id: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn run_input_uses_camel_case() {
        let input: RunInput = serde_json::from_str(
            r#"{"url":"https://example.com","selectedTopic":"Tea","targetKeywords":["green tea"]}"#,
        )
        .unwrap();
        assert_eq!(input.selected_topic.as_deref(), Some("Tea"));
        assert_eq!(input.target_keywords, vec!["green tea"]);

        let bare: RunInput = serde_json::from_str(r#"{"url":"https://example.com"}"#).unwrap();
        assert_eq!(bare, RunInput::new("https://example.com"));
    }

    #[test]
    fn model_role_display() {
        assert_eq!(ModelRole::Research.to_string(), "research");
        assert_eq!(
            serde_json::to_string(&ModelRole::Writer).unwrap(),
            "\"writer\""
        );
    }
}
