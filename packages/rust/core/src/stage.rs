//! Stage descriptors.
//!
//! A [`StageSpec`] is plain data plus two function pointers: `plan` turns the
//! context into the capability call to make, `finish` turns the extracted
//! value into the stage's domain record. The orchestrator never looks inside
//! either.

use blogsmith_extract::{Contract, Extraction};
use blogsmith_shared::{Document, ModelRole, PublishReceipt, SiteSnapshot};
use serde_json::Value;

use crate::context::PipelineContext;

/// Builds a prompt from a freshly fetched page and the context.
pub type SnapshotPrompt = fn(&SiteSnapshot, &PipelineContext) -> String;

/// The capability call a stage wants made.
#[derive(Debug, Clone)]
pub enum StagePlan {
    /// One generation call.
    Generate { prompt: String },
    /// Fetch `url`, then one generation call over the page.
    FetchThenGenerate { url: String, prompt: SnapshotPrompt },
    /// Hand a finished document to the publish capability.
    Publish { document: Document },
}

impl StagePlan {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "generate",
            Self::FetchThenGenerate { .. } => "fetch_then_generate",
            Self::Publish { .. } => "publish",
        }
    }
}

/// Everything a stage's `finish` step can look at.
#[derive(Debug, Clone, Copy)]
pub struct StageOutput<'a> {
    pub extraction: &'a Extraction,
    /// Present for fetch stages.
    pub snapshot: Option<&'a SiteSnapshot>,
    /// Present for publish stages.
    pub receipt: Option<&'a PublishReceipt>,
}

/// One step of a pipeline.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// Unique within a pipeline.
    pub name: &'static str,
    /// Earlier stages whose results must be in the context.
    pub requires: &'static [&'static str],
    pub contract: Contract,
    pub role: ModelRole,
    /// A failed optional stage is skipped instead of aborting the run.
    pub required: bool,
    /// Whether generation output may be served from the stage cache.
    pub cacheable: bool,
    /// Whether a transient failure may be retried. Off for calls with side
    /// effects that are not idempotent.
    pub retryable: bool,
    pub plan: fn(&PipelineContext) -> StagePlan,
    pub finish: fn(&StageOutput<'_>, &PipelineContext) -> Value,
}

impl StageSpec {
    pub fn new(
        name: &'static str,
        contract: Contract,
        plan: fn(&PipelineContext) -> StagePlan,
        finish: fn(&StageOutput<'_>, &PipelineContext) -> Value,
    ) -> Self {
        Self {
            name,
            requires: &[],
            contract,
            role: ModelRole::Writer,
            required: true,
            cacheable: true,
            retryable: true,
            plan,
            finish,
        }
    }

    pub fn requires(mut self, names: &'static [&'static str]) -> Self {
        self.requires = names;
        self
    }

    pub fn role(mut self, role: ModelRole) -> Self {
        self.role = role;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn uncached(mut self) -> Self {
        self.cacheable = false;
        self
    }

    pub fn no_retry(mut self) -> Self {
        self.retryable = false;
        self
    }
}
