//! Stage 2: research which pages of the site draw the most traffic.

use blogsmith_extract::{Contract, InsightKind, mine};
use blogsmith_shared::ModelRole;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::analyze_site::SiteAnalysis;
use super::fields;
use super::names::{ANALYZE_SITE, POPULAR_PAGES};
use super::to_record;
use crate::context::PipelineContext;
use crate::stage::{StageOutput, StagePlan, StageSpec};

const MAX_PAGES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PopularPages {
    pub domain: String,
    pub popular_pages: Vec<String>,
    pub content_types: Vec<String>,
    /// Site content categories mentioned in the research.
    pub categories: Vec<String>,
    pub research: String,
}

pub fn stage() -> StageSpec {
    StageSpec::new(
        POPULAR_PAGES,
        Contract::insights(InsightKind::Urls),
        plan,
        finish,
    )
    .requires(&[ANALYZE_SITE])
    .role(ModelRole::Research)
}

fn plan(ctx: &PipelineContext) -> StagePlan {
    let site: SiteAnalysis = ctx.record(ANALYZE_SITE);
    StagePlan::Generate {
        prompt: format!(
            "What are the most popular and high-traffic pages on {domain}?\n\
             List the top 10 pages with their URLs and a short description of each.\n\
             Focus on:\n\
             - most visited product categories\n\
             - top landing pages\n\
             - popular blog posts or content sections\n\
             - main navigation pages\n\
             Give full URLs wherever possible.",
            domain = site.domain,
        ),
    }
}

fn finish(out: &StageOutput<'_>, ctx: &PipelineContext) -> Value {
    let site: SiteAnalysis = ctx.record(ANALYZE_SITE);
    let raw = &out.extraction.raw_text;
    let lower = raw.to_lowercase();

    let mut pages = fields::dedupe(fields::list_of(&out.extraction.value));
    pages.truncate(MAX_PAGES);

    let categories = site
        .content_categories
        .iter()
        .filter(|c| lower.contains(&c.to_lowercase()))
        .cloned()
        .collect();

    to_record(&PopularPages {
        domain: site.domain,
        popular_pages: pages,
        content_types: mine(raw, InsightKind::ContentTypes),
        categories,
        research: raw.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StageResult;
    use blogsmith_extract::{ExtractionMode, extract};
    use blogsmith_shared::RunInput;

    fn context() -> PipelineContext {
        let mut ctx = PipelineContext::new(RunInput::new("https://leafandkettle.com"));
        let site = SiteAnalysis {
            domain: "leafandkettle.com".into(),
            content_categories: vec!["Brewing".into(), "Teaware".into()],
            ..SiteAnalysis::default()
        };
        ctx.insert(
            ANALYZE_SITE,
            StageResult {
                raw_text: String::new(),
                structured: Value::Null,
                extraction_mode: ExtractionMode::Strict,
                duration_ms: 0,
                record: to_record(&site),
                cached: false,
            },
        )
        .unwrap();
        ctx
    }

    #[test]
    fn prompt_names_domain() {
        let StagePlan::Generate { prompt } = plan(&context()) else {
            panic!("expected a generate plan");
        };
        assert!(prompt.contains("high-traffic pages on leafandkettle.com"));
    }

    #[test]
    fn mines_pages_and_types_from_prose() {
        let raw = "The most visited pages are:\n\
                   1. https://leafandkettle.com/shop - the product catalog\n\
                   2. https://leafandkettle.com/blog/brewing-guide - a popular brewing guide\n\
                   3. https://leafandkettle.com/shop again.";
        let ctx = context();
        let extraction = extract(raw, &stage().contract);
        assert_eq!(extraction.mode, ExtractionMode::Fallback);

        let out = StageOutput {
            extraction: &extraction,
            snapshot: None,
            receipt: None,
        };
        let pages: PopularPages = serde_json::from_value(finish(&out, &ctx)).unwrap();
        assert_eq!(
            pages.popular_pages,
            vec![
                "https://leafandkettle.com/shop",
                "https://leafandkettle.com/blog/brewing-guide"
            ]
        );
        assert_eq!(pages.content_types, vec!["blog", "product", "guide"]);
        assert_eq!(pages.categories, vec!["Brewing"]);
        assert_eq!(pages.domain, "leafandkettle.com");
    }
}
