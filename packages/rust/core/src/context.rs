//! Accumulated state of one run: caller input, stage results in execution
//! order, and orchestrator decisions.

use blogsmith_extract::ExtractionMode;
use blogsmith_shared::{BlogsmithError, Result, RunInput};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// What one completed stage left behind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    /// Capability output exactly as received.
    pub raw_text: String,
    /// Value produced by the extractor; always matches the stage's shape.
    pub structured: Value,
    pub extraction_mode: ExtractionMode,
    pub duration_ms: u64,
    /// The stage's normalized domain record.
    pub record: Value,
    /// Served from the stage cache instead of a capability call.
    pub cached: bool,
}

/// Append-only map of stage name to result, in insertion order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineContext {
    input: RunInput,
    results: IndexMap<String, StageResult>,
    decisions: IndexMap<String, String>,
}

impl PipelineContext {
    pub fn new(input: RunInput) -> Self {
        Self {
            input,
            results: IndexMap::new(),
            decisions: IndexMap::new(),
        }
    }

    pub fn input(&self) -> &RunInput {
        &self.input
    }

    /// Record the result of `stage`. A second write for the same name is
    /// rejected and leaves the context untouched.
    pub fn insert(&mut self, stage: &str, result: StageResult) -> Result<()> {
        if self.results.contains_key(stage) {
            return Err(BlogsmithError::validation(format!(
                "stage `{stage}` already has a result"
            )));
        }
        self.results.insert(stage.to_string(), result);
        Ok(())
    }

    pub fn get(&self, stage: &str) -> Option<&StageResult> {
        self.results.get(stage)
    }

    pub fn contains(&self, stage: &str) -> bool {
        self.results.contains_key(stage)
    }

    /// Stage names in the order they completed.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    pub fn results(&self) -> impl Iterator<Item = (&str, &StageResult)> {
        self.results.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The typed record of `stage`, or `T::default()` when the stage has not
    /// run or its record does not deserialize into `T`.
    pub fn record<T: DeserializeOwned + Default>(&self, stage: &str) -> T {
        self.results
            .get(stage)
            .and_then(|r| serde_json::from_value(r.record.clone()).ok())
            .unwrap_or_default()
    }

    /// Store an orchestrator decision. Later writes for the same key win.
    pub fn decide(&mut self, key: &str, value: impl Into<String>) {
        self.decisions.insert(key.to_string(), value.into());
    }

    pub fn decision(&self, key: &str) -> Option<&str> {
        self.decisions.get(key).map(String::as_str)
    }

    pub fn decisions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.decisions.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
