//! Stage 10: hand the finished post to the publish capability.

use blogsmith_extract::Contract;
use blogsmith_shared::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::final_edit::FinalDraft;
use super::fields;
use super::names::{FINAL_EDIT, PUBLISH};
use super::to_record;
use crate::context::PipelineContext;
use crate::stage::{StageOutput, StagePlan, StageSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublishedPost {
    pub id: String,
    pub url: String,
    pub title: String,
    pub slug: String,
    pub word_count: usize,
    pub seo_score: u64,
    pub publish_ready: bool,
}

pub fn stage() -> StageSpec {
    StageSpec::new(PUBLISH, Contract::object(), plan, finish)
        .requires(&[FINAL_EDIT])
        .uncached()
        .no_retry()
}

/// The document sent to the publisher.
pub fn document(draft: &FinalDraft) -> Document {
    let meta = &draft.metadata;
    Document {
        title: meta.title.clone(),
        slug: meta.slug.clone(),
        body: draft.final_content.clone(),
        metadata: json!({
            "metaDescription": meta.meta_description,
            "keywords": meta.keywords,
            "categories": meta.categories,
            "tags": meta.tags,
            "wordCount": meta.word_count,
            "estimatedReadingTime": meta.estimated_reading_time,
            "seoScore": draft.seo_analysis.overall_score,
        }),
    }
}

fn plan(ctx: &PipelineContext) -> StagePlan {
    let draft: FinalDraft = ctx.record(FINAL_EDIT);
    StagePlan::Publish {
        document: document(&draft),
    }
}

fn finish(out: &StageOutput<'_>, ctx: &PipelineContext) -> Value {
    let draft: FinalDraft = ctx.record(FINAL_EDIT);
    let value = &out.extraction.value;
    let (id, url) = match out.receipt {
        Some(receipt) => (receipt.id.clone(), receipt.url.clone()),
        None => (
            fields::text_or(value, "id", ""),
            fields::text_or(value, "url", ""),
        ),
    };

    to_record(&PublishedPost {
        id,
        url,
        title: draft.metadata.title,
        slug: draft.metadata.slug,
        word_count: draft.metadata.word_count,
        seo_score: draft.seo_analysis.overall_score,
        publish_ready: draft.publish_ready,
    })
}
