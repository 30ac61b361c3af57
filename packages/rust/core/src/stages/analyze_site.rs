//! Stage 1: fetch the site and characterize the business behind it.

use blogsmith_extract::Contract;
use blogsmith_shared::SiteSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields;
use super::names::ANALYZE_SITE;
use super::to_record;
use crate::context::PipelineContext;
use crate::stage::{StageOutput, StagePlan, StageSpec};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteAnalysis {
    pub url: String,
    pub domain: String,
    pub site: SiteSnapshot,
    pub business_type: String,
    pub main_products: Vec<String>,
    pub target_audience: String,
    pub content_categories: Vec<String>,
    pub industry: String,
    pub communication_style: String,
    pub summary: String,
}

pub fn stage() -> StageSpec {
    StageSpec::new(ANALYZE_SITE, Contract::object(), plan, finish)
}

fn plan(ctx: &PipelineContext) -> StagePlan {
    StagePlan::FetchThenGenerate {
        url: ctx.input().url.clone(),
        prompt,
    }
}

fn prompt(site: &SiteSnapshot, _ctx: &PipelineContext) -> String {
    format!(
        "Analyze this website and describe its business, content and audience.\n\n\
         Website URL: {url}\n\
         Title: {title}\n\
         Description: {description}\n\
         Main headings: {headings}\n\
         Content sample: {text}\n\n\
         Respond with ONLY a JSON object with these keys:\n\
         - businessType: what kind of business this is\n\
         - mainProducts: array of the main products or services\n\
         - targetAudience: who the site is written for\n\
         - contentCategories: array of content categories the site focuses on\n\
         - industry: the industry vertical\n\
         - communicationStyle: tone and style of the copy\n\
         - summary: two or three sentences about the site",
        url = site.url,
        title = site.title,
        description = site.description,
        headings = site.headings.join(", "),
        text = site.text,
    )
}

fn finish(out: &StageOutput<'_>, ctx: &PipelineContext) -> Value {
    let value = &out.extraction.value;
    let site = out.snapshot.cloned().unwrap_or_default();
    let url = if site.url.is_empty() {
        ctx.input().url.clone()
    } else {
        site.url.clone()
    };

    to_record(&SiteAnalysis {
        domain: fields::domain_of(&url),
        url,
        site,
        business_type: fields::text_or(value, "businessType", "Unknown"),
        main_products: fields::list(value, "mainProducts"),
        target_audience: fields::text_or(value, "targetAudience", "General consumers"),
        content_categories: fields::list(value, "contentCategories"),
        industry: fields::text_or(value, "industry", "General"),
        communication_style: fields::text_or(value, "communicationStyle", "Professional"),
        summary: fields::text(value, "summary")
            .unwrap_or_else(|| out.extraction.raw_text.trim().to_string()),
    })
}
