//! Run report: what completed, how long each stage took, and where a failed
//! run stopped.
//!
//! A [`ReportBuilder`] accumulates stage timings and is consumed by
//! [`ReportBuilder::succeed`] or [`ReportBuilder::fail`], so a report can only
//! be finalized once.

use std::time::Instant;

use blogsmith_extract::ExtractionMode;
use blogsmith_shared::{BlogsmithError, ErrorKind, RunId};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub name: String,
    pub duration_ms: u64,
    pub extraction_mode: ExtractionMode,
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFailure {
    pub failed_stage: String,
    /// Zero-based position of the failed stage in the pipeline.
    pub failed_at_index: usize,
    /// `"<stage>: <cause>"`.
    pub error_message: String,
    pub error_kind: ErrorKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: RunId,
    pub total_stages: usize,
    pub steps_completed: Vec<String>,
    pub stages: Vec<StageTiming>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Stages whose output came from the fallback extractor.
    pub fn fallback_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.extraction_mode == ExtractionMode::Fallback)
            .count()
    }
}

#[derive(Debug)]
pub struct ReportBuilder {
    run_id: RunId,
    total_stages: usize,
    started_at: DateTime<Utc>,
    clock: Instant,
    stages: Vec<StageTiming>,
}

impl ReportBuilder {
    pub fn new(run_id: RunId, total_stages: usize) -> Self {
        Self {
            run_id,
            total_stages,
            started_at: Utc::now(),
            clock: Instant::now(),
            stages: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.clock.elapsed().as_millis() as u64
    }

    /// Record a completed stage.
    pub fn completed(&mut self, timing: StageTiming) {
        self.stages.push(timing);
    }

    pub fn succeed(self) -> RunReport {
        self.finalize(None)
    }

    pub fn fail(self, stage: &str, index: usize, error: &BlogsmithError) -> RunReport {
        let failure = RunFailure {
            failed_stage: stage.to_string(),
            failed_at_index: index,
            error_message: format!("{stage}: {error}"),
            error_kind: error.kind(),
        };
        self.finalize(Some(failure))
    }

    fn finalize(self, failure: Option<RunFailure>) -> RunReport {
        let total_duration_ms = self.elapsed_ms();
        RunReport {
            run_id: self.run_id,
            total_stages: self.total_stages,
            steps_completed: self.stages.iter().map(|s| s.name.clone()).collect(),
            stages: self.stages,
            started_at: self.started_at,
            ended_at: Utc::now(),
            total_duration_ms,
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(name: &str, mode: ExtractionMode) -> StageTiming {
        StageTiming {
            name: name.into(),
            duration_ms: 5,
            extraction_mode: mode,
            cached: false,
        }
    }

    #[test]
    fn success_lists_every_stage() {
        let mut builder = ReportBuilder::new(RunId::new(), 2);
        builder.completed(timing("a", ExtractionMode::Strict));
        builder.completed(timing("b", ExtractionMode::Fallback));
        let report = builder.succeed();

        assert!(report.is_success());
        assert_eq!(report.steps_completed, vec!["a", "b"]);
        assert_eq!(report.fallback_count(), 1);
        assert!(report.ended_at >= report.started_at);
    }

    #[test]
    fn failure_names_stage_and_cause() {
        let mut builder = ReportBuilder::new(RunId::new(), 3);
        builder.completed(timing("a", ExtractionMode::Strict));
        let err = BlogsmithError::Generation("HTTP 503: busy".into());
        let report = builder.fail("b", 1, &err);

        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.failed_stage, "b");
        assert_eq!(failure.failed_at_index, 1);
        assert_eq!(failure.error_message, "b: generation error: HTTP 503: busy");
        assert_eq!(failure.error_kind, ErrorKind::Generation);
        assert_eq!(report.steps_completed, vec!["a"]);
    }

    #[test]
    fn serializes_camel_case() {
        let report = ReportBuilder::new(RunId::new(), 1).fail("a", 0, &BlogsmithError::Cancelled);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failure"]["failedAtIndex"], 0);
        assert_eq!(json["failure"]["errorKind"], "cancelled");
        assert!(json["stepsCompleted"].as_array().unwrap().is_empty());
    }
}
