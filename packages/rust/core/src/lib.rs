//! Core pipeline orchestration and domain logic for Blogsmith.
//!
//! This crate defines the ten blog stages, runs them in order against the
//! generation, fetch and publish capabilities, and wraps the run in the
//! `create_blog` workflow.

pub mod cache;
pub mod context;
pub mod orchestrator;
pub mod pipeline;
pub mod plan;
pub mod progress;
pub mod report;
pub mod stage;
pub mod stages;
pub mod topic;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{StageCache, input_hash};
pub use context::{PipelineContext, StageResult};
pub use orchestrator::{Capabilities, Orchestrator, RunOutcome};
pub use pipeline::{BlogDeps, BlogSummary, create_blog, summarize, validate_input};
pub use plan::{DecisionPoint, Pipeline, ValidationIssue, ValidationReport};
pub use progress::{ProgressReporter, SilentProgress};
pub use report::{RunFailure, RunReport, StageTiming};
pub use stage::{StagePlan, StageSpec};
pub use stages::blog_pipeline;
