//! End-to-end `create` entry point: input validation, pipeline validation,
//! the orchestrated run, and the run history record.

use std::sync::Arc;

use blogsmith_shared::{BlogsmithError, Result, RunId, RunInput};
use blogsmith_storage::{RunCompletion, RunStatus, Storage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use url::Url;

use crate::orchestrator::{Orchestrator, RunOutcome};
use crate::plan::Pipeline;
use crate::progress::ProgressReporter;
use crate::stages::final_edit::FinalDraft;
use crate::stages::names::{FINAL_EDIT, PUBLISH};
use crate::stages::publish::PublishedPost;
use crate::topic::TOPIC_KEY;

/// Everything a run needs besides its input.
pub struct BlogDeps {
    pub orchestrator: Orchestrator,
    pub pipeline: Pipeline,
    /// Where finished runs are recorded. Recording failures are logged, not
    /// propagated.
    pub history: Option<Arc<Storage>>,
}

impl BlogDeps {
    /// The shipped ten-stage pipeline, without history.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            pipeline: crate::stages::blog_pipeline(),
            history: None,
        }
    }

    pub fn with_history(mut self, storage: Arc<Storage>) -> Self {
        self.history = Some(storage);
        self
    }
}

/// Check that `input.url` is a non-empty http(s) URL.
pub fn validate_input(input: &RunInput) -> Result<Url> {
    let raw = input.url.trim();
    if raw.is_empty() {
        return Err(BlogsmithError::validation("url is required"));
    }
    let url = Url::parse(raw)
        .map_err(|e| BlogsmithError::validation(format!("invalid url `{raw}`: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BlogsmithError::validation(format!(
            "unsupported url scheme `{other}`, expected http or https"
        ))),
    }
}

/// Run the blog pipeline for `input`.
///
/// Returns `Err` only when nothing ran: invalid input or an invalid
/// pipeline. Stage failures are reported in the outcome.
#[instrument(skip_all, fields(url = %input.url))]
pub async fn create_blog(
    input: RunInput,
    deps: &BlogDeps,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    validate_input(&input)?;
    deps.pipeline.validate().into_result()?;

    let run_id = RunId::new();
    if let Some(history) = &deps.history {
        if let Err(e) = history
            .insert_run(&run_id.to_string(), &input.url, Utc::now())
            .await
        {
            warn!(%run_id, error = %e, "failed to record run start");
        }
    }

    let outcome = deps
        .orchestrator
        .run(run_id, input, &deps.pipeline, progress, cancel)
        .await;

    if let Some(history) = &deps.history {
        if let Err(e) = record_outcome(history, &outcome).await {
            warn!(run_id = %outcome.report.run_id, error = %e, "failed to record run result");
        }
    }

    info!(
        run_id = %outcome.report.run_id,
        success = outcome.report.is_success(),
        elapsed_ms = outcome.report.total_duration_ms,
        "create_blog finished"
    );
    Ok(outcome)
}

async fn record_outcome(history: &Storage, outcome: &RunOutcome) -> Result<()> {
    let report = &outcome.report;
    let report_json =
        serde_json::to_string(report).map_err(|e| BlogsmithError::Storage(e.to_string()))?;
    let failure = report.failure.as_ref();

    history
        .finish_run(
            &report.run_id.to_string(),
            &RunCompletion {
                status: if report.is_success() {
                    RunStatus::Succeeded
                } else {
                    RunStatus::Failed
                },
                topic: outcome.context.decision(TOPIC_KEY),
                ended_at: report.ended_at,
                total_duration_ms: report.total_duration_ms,
                steps_completed: report.steps_completed.len() as u32,
                failed_stage: failure.map(|f| f.failed_stage.as_str()),
                error_message: failure.map(|f| f.error_message.as_str()),
                report_json: &report_json,
            },
        )
        .await
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Caller-facing digest of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogSummary {
    pub success: bool,
    pub input: RunInput,
    pub topic: Option<String>,
    pub blog_created: BlogCreated,
    pub pipeline: PipelineSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogCreated {
    pub title: String,
    pub slug: String,
    pub word_count: usize,
    pub seo_score: u64,
    pub publish_ready: bool,
    pub document_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub total_steps: usize,
    pub steps_completed: usize,
    pub completed_steps: Vec<String>,
    pub fallback_stages: usize,
    pub processing_time_ms: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Summarize `outcome` from the final-edit and publish records.
pub fn summarize(outcome: &RunOutcome) -> BlogSummary {
    let report = &outcome.report;
    let ctx = &outcome.context;
    let draft: FinalDraft = ctx.record(FINAL_EDIT);
    let post: PublishedPost = ctx.record(PUBLISH);

    BlogSummary {
        success: report.is_success(),
        input: ctx.input().clone(),
        topic: ctx.decision(TOPIC_KEY).map(str::to_string),
        blog_created: BlogCreated {
            title: draft.metadata.title,
            slug: draft.metadata.slug,
            word_count: draft.metadata.word_count,
            seo_score: draft.seo_analysis.overall_score,
            publish_ready: draft.publish_ready,
            document_id: post.id,
            url: post.url,
        },
        pipeline: PipelineSummary {
            total_steps: report.total_stages,
            steps_completed: report.steps_completed.len(),
            completed_steps: report.steps_completed.clone(),
            fallback_stages: report.fallback_count(),
            processing_time_ms: report.total_duration_ms,
            start_time: report.started_at,
            end_time: report.ended_at,
        },
    }
}
