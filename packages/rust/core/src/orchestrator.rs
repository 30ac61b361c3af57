//! Sequential stage execution.
//!
//! For each stage, in order:
//! 1. check that every required stage is already in the context
//! 2. build the plan from the context
//! 3. serve generation from the stage cache, or call the capability under
//!    the per-stage timeout (retrying transient failures of retryable
//!    stages when configured)
//! 4. extract, derive the record, append the result
//! 5. evaluate decision points attached to the stage
//!
//! Any failure of a required stage ends the run. The report records the
//! stage, its index and the cause.

use std::sync::Arc;
use std::time::Instant;

use blogsmith_extract::{Extraction, ExtractionMode, extract};
use blogsmith_shared::{
    BlogsmithError, Fetcher, GenerationRequest, Generator, PipelineOptions, PublishReceipt,
    Publisher, Result, RunId, RunInput, SiteSnapshot,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{StageCache, input_hash};
use crate::context::{PipelineContext, StageResult};
use crate::plan::Pipeline;
use crate::progress::ProgressReporter;
use crate::report::{ReportBuilder, RunReport, StageTiming};
use crate::stage::{StageOutput, StagePlan, StageSpec};

/// The external collaborators a run drives.
#[derive(Clone)]
pub struct Capabilities {
    pub generator: Arc<dyn Generator>,
    pub fetcher: Arc<dyn Fetcher>,
    pub publisher: Arc<dyn Publisher>,
}

/// Final state of a run: the report and everything the stages produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub context: PipelineContext,
}

/// What one successful capability round trip returned.
struct Executed {
    raw_text: String,
    cached: bool,
    snapshot: Option<SiteSnapshot>,
    receipt: Option<PublishReceipt>,
}

pub struct Orchestrator {
    caps: Capabilities,
    options: PipelineOptions,
    cache: Option<Arc<dyn StageCache>>,
}

impl Orchestrator {
    pub fn new(caps: Capabilities, options: PipelineOptions) -> Self {
        Self {
            caps,
            options,
            cache: None,
        }
    }

    /// Memoize generation output. Only consulted when `options.use_cache`.
    pub fn with_cache(mut self, cache: Arc<dyn StageCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run `pipeline` to completion or first failure. Never returns early
    /// without a finalized report.
    #[instrument(skip_all, fields(run_id = %run_id, url = %input.url))]
    pub async fn run(
        &self,
        run_id: RunId,
        input: RunInput,
        pipeline: &Pipeline,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let total = pipeline.len();
        let mut ctx = PipelineContext::new(input);
        let mut report = ReportBuilder::new(run_id, total);
        info!(stages = total, "starting pipeline");

        for (index, stage) in pipeline.stages().iter().enumerate() {
            progress.stage_started(stage.name, index, total);

            let outcome = match self.run_stage(stage, &ctx, cancel).await {
                Ok(result) => {
                    let timing = StageTiming {
                        name: stage.name.to_string(),
                        duration_ms: result.duration_ms,
                        extraction_mode: result.extraction_mode,
                        cached: result.cached,
                    };
                    ctx.insert(stage.name, result).map(|()| timing)
                }
                Err(err) => Err(err),
            };

            match outcome {
                Ok(timing) => {
                    let fallback = timing.extraction_mode == ExtractionMode::Fallback;
                    if fallback {
                        warn!(
                            stage = stage.name,
                            "no structured output found, used fallback extraction"
                        );
                    }
                    info!(
                        stage = stage.name,
                        step = index + 1,
                        total,
                        elapsed_ms = timing.duration_ms,
                        mode = %timing.extraction_mode,
                        cached = timing.cached,
                        "stage completed"
                    );
                    progress.stage_completed(stage.name, timing.duration_ms, fallback);
                    report.completed(timing);

                    for decision in pipeline.decisions_after(stage.name) {
                        let value = (decision.decide)(&ctx);
                        info!(decision = decision.key, %value, "decision made");
                        ctx.decide(decision.key, value);
                    }
                }
                Err(err) if !stage.required && !matches!(err, BlogsmithError::Cancelled) => {
                    warn!(stage = stage.name, error = %err, "optional stage failed, skipping");
                    progress.stage_failed(stage.name, &err.to_string());
                }
                Err(err) => {
                    error!(
                        stage = stage.name,
                        step = index + 1,
                        total,
                        elapsed_ms = report.elapsed_ms(),
                        error = %err,
                        "stage failed"
                    );
                    progress.stage_failed(stage.name, &err.to_string());
                    let report = report.fail(stage.name, index, &err);
                    progress.done(&report);
                    return RunOutcome {
                        report,
                        context: ctx,
                    };
                }
            }
        }

        let report = report.succeed();
        info!(
            elapsed_ms = report.total_duration_ms,
            fallbacks = report.fallback_count(),
            "pipeline completed"
        );
        progress.done(&report);
        RunOutcome {
            report,
            context: ctx,
        }
    }

    async fn run_stage(
        &self,
        stage: &StageSpec,
        ctx: &PipelineContext,
        cancel: &CancellationToken,
    ) -> Result<StageResult> {
        if cancel.is_cancelled() {
            return Err(BlogsmithError::Cancelled);
        }
        if let Some(missing) = stage.requires.iter().find(|r| !ctx.contains(r)) {
            return Err(BlogsmithError::dependency(stage.name, *missing));
        }

        let started = Instant::now();
        let plan = (stage.plan)(ctx);
        debug!(stage = stage.name, plan = plan.kind(), "plan built");

        let executed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BlogsmithError::Cancelled),
            res = self.execute_with_retry(stage, &plan, ctx) => res?,
        };

        let extraction = extract(&executed.raw_text, &stage.contract);
        let record = (stage.finish)(
            &StageOutput {
                extraction: &extraction,
                snapshot: executed.snapshot.as_ref(),
                receipt: executed.receipt.as_ref(),
            },
            ctx,
        );
        let Extraction {
            value,
            mode,
            raw_text,
        } = extraction;

        Ok(StageResult {
            raw_text,
            structured: value,
            extraction_mode: mode,
            duration_ms: started.elapsed().as_millis() as u64,
            record,
            cached: executed.cached,
        })
    }

    async fn execute_with_retry(
        &self,
        stage: &StageSpec,
        plan: &StagePlan,
        ctx: &PipelineContext,
    ) -> Result<Executed> {
        let policy = &self.options.retry;
        let max_attempts = if stage.retryable {
            policy.max_attempts.max(1)
        } else {
            1
        };
        let mut attempt = 1;

        loop {
            let delay = policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let result =
                match tokio::time::timeout(self.options.stage_timeout, self.execute(stage, plan, ctx))
                    .await
                {
                    Ok(res) => res,
                    Err(_) => Err(BlogsmithError::Timeout {
                        stage: stage.name.to_string(),
                        after: self.options.stage_timeout,
                    }),
                };

            match result {
                Ok(executed) => return Ok(executed),
                Err(err) if attempt < max_attempts && err.is_transient() => {
                    warn!(
                        stage = stage.name,
                        attempt,
                        max_attempts,
                        error = %err,
                        "stage attempt failed, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn execute(
        &self,
        stage: &StageSpec,
        plan: &StagePlan,
        ctx: &PipelineContext,
    ) -> Result<Executed> {
        match plan {
            StagePlan::Generate { prompt } => {
                let (raw_text, cached) = self.generate(stage, prompt).await?;
                Ok(Executed {
                    raw_text,
                    cached,
                    snapshot: None,
                    receipt: None,
                })
            }
            StagePlan::FetchThenGenerate { url, prompt } => {
                let snapshot = self.caps.fetcher.fetch(url).await?;
                let prompt = prompt(&snapshot, ctx);
                let (raw_text, cached) = self.generate(stage, &prompt).await?;
                Ok(Executed {
                    raw_text,
                    cached,
                    snapshot: Some(snapshot),
                    receipt: None,
                })
            }
            StagePlan::Publish { document } => {
                let receipt = self.caps.publisher.publish(document).await?;
                let raw_text = serde_json::to_string(&receipt)
                    .map_err(|e| BlogsmithError::Publish(format!("unserializable receipt: {e}")))?;
                Ok(Executed {
                    raw_text,
                    cached: false,
                    snapshot: None,
                    receipt: Some(receipt),
                })
            }
        }
    }

    /// Raw generation text for `prompt`, and whether it came from the cache.
    async fn generate(&self, stage: &StageSpec, prompt: &str) -> Result<(String, bool)> {
        let cache = self
            .cache
            .as_deref()
            .filter(|_| self.options.use_cache && stage.cacheable);
        let key = cache.map(|_| {
            (
                input_hash(stage.name, stage.role, prompt),
                self.caps.generator.model_for(stage.role),
            )
        });

        if let (Some(cache), Some((hash, model))) = (cache, &key) {
            match cache.get(stage.name, hash, model).await {
                Ok(Some(raw)) => {
                    debug!(stage = stage.name, "stage cache hit");
                    return Ok((raw, true));
                }
                Ok(None) => {}
                Err(e) => warn!(stage = stage.name, error = %e, "stage cache lookup failed"),
            }
        }

        let generation = self
            .caps
            .generator
            .generate(GenerationRequest {
                stage: stage.name.to_string(),
                role: stage.role,
                prompt: prompt.to_string(),
            })
            .await?;
        debug!(
            stage = stage.name,
            model = %generation.model,
            tokens_in = generation.tokens_in,
            tokens_out = generation.tokens_out,
            "generation received"
        );

        if let (Some(cache), Some((hash, model))) = (cache, &key) {
            if let Err(e) = cache.put(stage.name, hash, model, &generation.text).await {
                warn!(stage = stage.name, error = %e, "stage cache write failed");
            }
        }

        Ok((generation.text, false))
    }
}
