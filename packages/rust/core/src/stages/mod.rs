//! The ten stages of the blog pipeline.
//!
//! Each module exposes a `stage()` describing the stage and the typed record it
//! leaves in the context. Records are tolerant: every field has a default so
//! downstream prompts still build when an upstream stage degraded.

pub mod analyze_site;
pub mod cluster_keywords;
pub mod content_strategy;
pub mod create_outline;
pub mod fields;
pub mod final_edit;
pub mod gap_analysis;
pub mod generate_keywords;
pub mod popular_pages;
pub mod publish;
pub mod write_content;

use serde::Serialize;
use serde_json::Value;

use crate::plan::{DecisionPoint, Pipeline};
use crate::topic::{TOPIC_KEY, decide_topic};

/// Stage names, in execution order.
pub mod names {
    pub const ANALYZE_SITE: &str = "analyze-site";
    pub const POPULAR_PAGES: &str = "research-popular-pages";
    pub const CONTENT_STRATEGY: &str = "research-content-strategy";
    pub const GENERATE_KEYWORDS: &str = "generate-keywords";
    pub const CLUSTER_KEYWORDS: &str = "cluster-keywords";
    pub const GAP_ANALYSIS: &str = "gap-analysis";
    pub const CREATE_OUTLINE: &str = "create-outline";
    pub const WRITE_CONTENT: &str = "write-content";
    pub const FINAL_EDIT: &str = "final-edit";
    pub const PUBLISH: &str = "publish";
}

/// The shipped pipeline: ten stages with topic selection after gap analysis.
pub fn blog_pipeline() -> Pipeline {
    Pipeline::new(vec![
        analyze_site::stage(),
        popular_pages::stage(),
        content_strategy::stage(),
        generate_keywords::stage(),
        cluster_keywords::stage(),
        gap_analysis::stage(),
        create_outline::stage(),
        write_content::stage(),
        final_edit::stage(),
        publish::stage(),
    ])
    .with_decision(DecisionPoint {
        key: TOPIC_KEY,
        after: names::GAP_ANALYSIS,
        decide: decide_topic,
    })
}

/// Serialize a record for storage in the context.
pub(crate) fn to_record<T: Serialize>(record: &T) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}
