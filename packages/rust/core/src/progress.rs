use crate::report::RunReport;

/// Progress callback for pipeline execution.
pub trait ProgressReporter: Send + Sync {
    /// Called before stage `index` (zero-based) of `total` starts.
    fn stage_started(&self, name: &str, index: usize, total: usize);
    /// Called when a stage result has been added to the context.
    fn stage_completed(&self, name: &str, duration_ms: u64, fallback: bool);
    /// Called when a stage fails, before the run is finalized.
    fn stage_failed(&self, name: &str, error: &str);
    /// Called once with the finalized report.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _name: &str, _index: usize, _total: usize) {}
    fn stage_completed(&self, _name: &str, _duration_ms: u64, _fallback: bool) {}
    fn stage_failed(&self, _name: &str, _error: &str) {}
    fn done(&self, _report: &RunReport) {}
}
