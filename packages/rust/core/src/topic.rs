//! Choosing what the post is about.

use crate::context::PipelineContext;
use crate::stages::gap_analysis::GapAnalysis;
use crate::stages::names;

/// Used when neither the caller nor the analysis offers a topic.
pub const DEFAULT_TOPIC: &str = "Industry Guide";

/// Context key under which the chosen topic is stored.
pub const TOPIC_KEY: &str = "topic";

/// First non-blank of: the caller's topic, the first blog suggestion, the
/// first content gap's topic, [`DEFAULT_TOPIC`].
pub fn select_topic(caller: Option<&str>, gaps: &GapAnalysis) -> String {
    let candidates = [
        caller,
        gaps.blog_suggestions.first().map(String::as_str),
        gaps.content_gaps.first().map(|g| g.topic.as_str()),
    ];
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TOPIC)
        .to_string()
}

/// Decision-point adapter over [`select_topic`].
pub(crate) fn decide_topic(ctx: &PipelineContext) -> String {
    let gaps: GapAnalysis = ctx.record(names::GAP_ANALYSIS);
    select_topic(ctx.input().selected_topic.as_deref(), &gaps)
}

/// The topic chosen for this run, or [`DEFAULT_TOPIC`] before the decision.
pub fn chosen_topic(ctx: &PipelineContext) -> &str {
    ctx.decision(TOPIC_KEY).unwrap_or(DEFAULT_TOPIC)
}
