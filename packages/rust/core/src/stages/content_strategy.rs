//! Stage 3: research what the site publishes today and what it is missing.

use blogsmith_extract::{Contract, InsightKind, mine};
use blogsmith_shared::ModelRole;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::analyze_site::SiteAnalysis;
use super::fields;
use super::names::{ANALYZE_SITE, CONTENT_STRATEGY, POPULAR_PAGES};
use super::popular_pages::PopularPages;
use super::to_record;
use crate::context::PipelineContext;
use crate::stage::{StageOutput, StagePlan, StageSpec};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentStrategy {
    pub domain: String,
    pub current_content: Vec<String>,
    pub content_gaps: Vec<String>,
    pub opportunities: Vec<String>,
    pub trending_topics: Vec<String>,
    pub research: String,
}

pub fn stage() -> StageSpec {
    StageSpec::new(
        CONTENT_STRATEGY,
        Contract::insights(InsightKind::ContentGaps),
        plan,
        finish,
    )
    .requires(&[ANALYZE_SITE, POPULAR_PAGES])
    .role(ModelRole::Research)
}

fn plan(ctx: &PipelineContext) -> StagePlan {
    let site: SiteAnalysis = ctx.record(ANALYZE_SITE);
    let pages: PopularPages = ctx.record(POPULAR_PAGES);
    let known_pages = if pages.popular_pages.is_empty() {
        "none found".to_string()
    } else {
        pages.popular_pages.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
    };

    StagePlan::Generate {
        prompt: format!(
            "What content is {domain} publishing today, and what is it missing?\n\
             {domain} is a {business} in the {industry} industry. Known popular pages: {known_pages}.\n\n\
             Cover:\n\
             - the blog topics, product information and educational content they publish\n\
             - topics competitors cover that they do not\n\
             - trending topics in {industry} they are missing\n\n\
             Then list the top 10 blog topics they should be writing about but currently are not,\n\
             as a numbered list, one specific and actionable post idea per line.",
            domain = site.domain,
            business = site.business_type,
            industry = site.industry,
        ),
    }
}

fn finish(out: &StageOutput<'_>, ctx: &PipelineContext) -> Value {
    let site: SiteAnalysis = ctx.record(ANALYZE_SITE);
    let raw = &out.extraction.raw_text;

    to_record(&ContentStrategy {
        domain: site.domain,
        current_content: mine(raw, InsightKind::CurrentContent),
        content_gaps: fields::list_of(&out.extraction.value),
        opportunities: mine(raw, InsightKind::Opportunities),
        trending_topics: mine(raw, InsightKind::TrendingTopics),
        research: raw.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogsmith_extract::extract;
    use blogsmith_shared::RunInput;

    #[test]
    fn derives_gaps_and_secondary_insights() {
        let raw = "Leaf & Kettle publishes brewing guides and product pages. \
                   Matcha is trending among younger buyers. \
                   There is an opportunity to write about tea and food pairing.\n\n\
                   1. **Cold brew tea recipes for summer**\n\
                   2. Comparing oolong and green tea caffeine\n\
                   3. Short";
        let ctx = PipelineContext::new(RunInput::new("https://leafandkettle.com"));
        let extraction = extract(raw, &stage().contract);
        let out = StageOutput {
            extraction: &extraction,
            snapshot: None,
            receipt: None,
        };
        let strategy: ContentStrategy = serde_json::from_value(finish(&out, &ctx)).unwrap();

        assert_eq!(
            strategy.content_gaps,
            vec![
                "Cold brew tea recipes for summer",
                "Comparing oolong and green tea caffeine"
            ]
        );
        assert_eq!(strategy.current_content, vec!["brewing guides and product pages"]);
        assert_eq!(
            strategy.trending_topics,
            vec!["Matcha is trending among younger buyers"]
        );
        assert!(
            strategy
                .opportunities
                .contains(&"There is an opportunity to write about tea and food pairing".to_string())
        );
        assert_eq!(strategy.research, raw);
    }

    #[test]
    fn strict_string_array_is_taken_as_gaps() {
        let raw = r#"["Tea storage tips", "Brewing temperature chart"]"#;
        let ctx = PipelineContext::new(RunInput::new("https://leafandkettle.com"));
        let extraction = extract(raw, &stage().contract);
        let out = StageOutput {
            extraction: &extraction,
            snapshot: None,
            receipt: None,
        };
        let strategy: ContentStrategy = serde_json::from_value(finish(&out, &ctx)).unwrap();
        assert_eq!(
            strategy.content_gaps,
            vec!["Tea storage tips", "Brewing temperature chart"]
        );
    }
}
