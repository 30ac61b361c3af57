//! Stage 6: rank content gaps and suggest posts.
//!
//! When the model's answer carries no gaps, a basic analysis is derived from
//! the content-strategy research instead, so topic selection and the outline
//! always have something to work with.

use blogsmith_extract::{Contract, ListLimits, list_candidates};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::analyze_site::SiteAnalysis;
use super::cluster_keywords::ClusterSet;
use super::content_strategy::ContentStrategy;
use super::fields;
use super::names::{
    ANALYZE_SITE, CLUSTER_KEYWORDS, CONTENT_STRATEGY, GAP_ANALYSIS, GENERATE_KEYWORDS,
    POPULAR_PAGES,
};
use super::popular_pages::PopularPages;
use super::to_record;
use crate::context::PipelineContext;
use crate::stage::{StageOutput, StagePlan, StageSpec};

const MAX_GAPS: usize = 8;
const MAX_SUGGESTIONS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentGap {
    pub topic: String,
    pub description: String,
    pub traffic_potential: String,
    pub competition: String,
    pub difficulty: String,
    pub business_relevance: String,
    pub suggested_content: String,
    pub target_keywords: Vec<String>,
    pub priority: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Opportunities {
    pub quick_wins: Vec<String>,
    pub long_term_projects: Vec<String>,
    pub seasonal_content: Vec<String>,
}

/// Gap topics sorted into four overlapping views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriorityMatrix {
    pub high_priority_high_impact: Vec<String>,
    pub quick_wins: Vec<String>,
    pub long_term_value: Vec<String>,
    pub low_hanging_fruit: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GapAnalysis {
    pub domain: String,
    pub industry: String,
    pub business_type: String,
    pub content_gaps: Vec<ContentGap>,
    pub opportunities: Opportunities,
    pub blog_suggestions: Vec<String>,
    pub recommendations: Vec<String>,
    pub priority_matrix: PriorityMatrix,
}

impl GapAnalysis {
    /// The gap whose topic mentions `topic`, ignoring case.
    pub fn gap_for(&self, topic: &str) -> Option<&ContentGap> {
        let needle = topic.to_lowercase();
        self.content_gaps
            .iter()
            .find(|g| g.topic.to_lowercase().contains(&needle))
    }
}

pub fn stage() -> StageSpec {
    StageSpec::new(GAP_ANALYSIS, Contract::object(), plan, finish).requires(&[
        ANALYZE_SITE,
        POPULAR_PAGES,
        CONTENT_STRATEGY,
        GENERATE_KEYWORDS,
        CLUSTER_KEYWORDS,
    ])
}

fn plan(ctx: &PipelineContext) -> StagePlan {
    let site: SiteAnalysis = ctx.record(ANALYZE_SITE);
    let pages: PopularPages = ctx.record(POPULAR_PAGES);
    let strategy: ContentStrategy = ctx.record(CONTENT_STRATEGY);
    let clusters: ClusterSet = ctx.record(CLUSTER_KEYWORDS);

    let take = |items: &[String], n: usize| items.iter().take(n).cloned().collect::<Vec<_>>().join(", ");
    let cluster_names: Vec<String> = clusters.clusters.iter().map(|c| c.name.clone()).collect();

    StagePlan::Generate {
        prompt: format!(
            "You are a content strategy expert. Analyze content gaps for {domain} \
             ({business} in {industry}).\n\n\
             Current insights:\n\
             - popular pages: {pages}\n\
             - identified content gaps: {gaps}\n\
             - keyword clusters: {clusters}\n\n\
             Identify the top 8 content gaps that are the best opportunities, group them into \
             opportunities, and suggest 5 specific blog post titles that would capture traffic.\n\n\
             Respond with ONLY this JSON structure:\n\
             {{\"contentGaps\": [{{\"topic\": \"...\", \"description\": \"...\", \"trafficPotential\": \"high\", \
             \"competition\": \"low\", \"difficulty\": \"easy\", \"businessRelevance\": \"high\", \
             \"suggestedContent\": \"...\", \"targetKeywords\": [\"...\"], \"priority\": 1}}], \
             \"opportunities\": {{\"quickWins\": [], \"longTermProjects\": [], \"seasonalContent\": []}}, \
             \"blogSuggestions\": [\"Blog title 1\"]}}",
            domain = site.domain,
            business = site.business_type,
            industry = site.industry,
            pages = take(&pages.popular_pages, 3),
            gaps = take(&strategy.content_gaps, 5),
            clusters = take(&cluster_names, 3),
        ),
    }
}

fn finish(out: &StageOutput<'_>, ctx: &PipelineContext) -> Value {
    let site: SiteAnalysis = ctx.record(ANALYZE_SITE);
    let value = &out.extraction.value;

    let mut gaps: Vec<ContentGap> = fields::items(value, "contentGaps")
        .iter()
        .enumerate()
        .filter_map(|(i, g)| gap_from(g, i))
        .take(MAX_GAPS)
        .collect();
    if gaps.is_empty() {
        gaps = basic_gaps(&ctx.record::<ContentStrategy>(CONTENT_STRATEGY).content_gaps);
    }

    let opportunities = value
        .get("opportunities")
        .map(|o| Opportunities {
            quick_wins: fields::list(o, "quickWins"),
            long_term_projects: fields::list(o, "longTermProjects"),
            seasonal_content: fields::list(o, "seasonalContent"),
        })
        .filter(|o| {
            !(o.quick_wins.is_empty()
                && o.long_term_projects.is_empty()
                && o.seasonal_content.is_empty())
        })
        .unwrap_or_else(|| opportunities_from(&gaps));

    let mut suggestions = fields::list(value, "blogSuggestions");
    if suggestions.is_empty() && out.extraction.is_fallback() {
        suggestions = list_candidates(&out.extraction.raw_text, &ListLimits::SUGGESTIONS);
    }
    suggestions.truncate(MAX_SUGGESTIONS);

    to_record(&GapAnalysis {
        domain: site.domain,
        industry: site.industry,
        business_type: site.business_type,
        recommendations: recommendations(&gaps),
        priority_matrix: priority_matrix(&gaps),
        content_gaps: gaps,
        opportunities,
        blog_suggestions: suggestions,
    })
}

fn gap_from(value: &Value, index: usize) -> Option<ContentGap> {
    let topic = fields::text(value, "topic")?.replace("**", "");
    Some(ContentGap {
        description: fields::text_or(value, "description", ""),
        traffic_potential: fields::text_or(value, "trafficPotential", "medium"),
        competition: fields::text_or(value, "competition", "medium"),
        difficulty: fields::text_or(value, "difficulty", "medium"),
        business_relevance: fields::text_or(value, "businessRelevance", "medium"),
        suggested_content: fields::text(value, "suggestedContent")
            .unwrap_or_else(|| format!("Complete guide to {topic}")),
        target_keywords: fields::list(value, "targetKeywords"),
        priority: fields::number(value, "priority").unwrap_or(index as u64 + 1),
        topic,
    })
}

/// Gaps built from research lines: earlier lines rank higher.
pub fn basic_gaps(research_gaps: &[String]) -> Vec<ContentGap> {
    research_gaps
        .iter()
        .map(|g| g.replace("**", "").trim().to_string())
        .filter(|g| !g.is_empty())
        .take(MAX_GAPS)
        .enumerate()
        .map(|(i, topic)| ContentGap {
            description: "Content opportunity identified through competitor analysis".into(),
            traffic_potential: if i < 3 { "high" } else { "medium" }.into(),
            competition: if i < 4 { "low" } else { "medium" }.into(),
            difficulty: if i < 5 { "easy" } else { "medium" }.into(),
            business_relevance: "high".into(),
            suggested_content: format!("Complete guide to {topic}"),
            target_keywords: Vec::new(),
            priority: i as u64 + 1,
            topic,
        })
        .collect()
}

fn topics<'a>(gaps: impl Iterator<Item = &'a ContentGap>) -> Vec<String> {
    gaps.map(|g| g.topic.clone()).collect()
}

fn opportunities_from(gaps: &[ContentGap]) -> Opportunities {
    let slice = |from: usize, to: usize| {
        topics(gaps.iter().skip(from).take(to.saturating_sub(from)))
    };
    Opportunities {
        quick_wins: slice(0, 3),
        long_term_projects: slice(3, 6),
        seasonal_content: slice(6, 8),
    }
}

fn is(value: &str, expected: &str) -> bool {
    value.eq_ignore_ascii_case(expected)
}

pub fn recommendations(gaps: &[ContentGap]) -> Vec<String> {
    let mut out = Vec::new();
    let top = topics(gaps.iter().filter(|g| g.priority <= 3));
    if !top.is_empty() {
        out.push(format!(
            "Start with high-priority content gaps: {}",
            top.join(", ")
        ));
    }
    if gaps
        .iter()
        .any(|g| is(&g.difficulty, "easy") && is(&g.traffic_potential, "high"))
    {
        out.push("Focus on quick wins for immediate traffic gains".into());
    }
    if gaps.iter().any(|g| is(&g.competition, "low")) {
        out.push("Target low-competition topics for easier ranking".into());
    }
    out
}

pub fn priority_matrix(gaps: &[ContentGap]) -> PriorityMatrix {
    PriorityMatrix {
        high_priority_high_impact: topics(
            gaps.iter()
                .filter(|g| g.priority <= 3 && is(&g.traffic_potential, "high")),
        ),
        quick_wins: topics(
            gaps.iter()
                .filter(|g| is(&g.difficulty, "easy") && is(&g.competition, "low")),
        ),
        long_term_value: topics(
            gaps.iter()
                .filter(|g| is(&g.business_relevance, "high") && is(&g.traffic_potential, "high")),
        ),
        low_hanging_fruit: topics(
            gaps.iter()
                .filter(|g| is(&g.difficulty, "easy") && g.priority <= 5),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StageResult;
    use blogsmith_extract::{ExtractionMode, extract};
    use blogsmith_shared::RunInput;

    fn context(research_gaps: &[&str]) -> PipelineContext {
        let mut ctx = PipelineContext::new(RunInput::new("https://leafandkettle.com"));
        let strategy = ContentStrategy {
            content_gaps: research_gaps.iter().map(|s| s.to_string()).collect(),
            ..ContentStrategy::default()
        };
        ctx.insert(
            CONTENT_STRATEGY,
            StageResult {
                raw_text: String::new(),
                structured: Value::Null,
                extraction_mode: ExtractionMode::Fallback,
                duration_ms: 0,
                record: to_record(&strategy),
                cached: false,
            },
        )
        .unwrap();
        ctx
    }

    fn finish_raw(ctx: &PipelineContext, raw: &str) -> GapAnalysis {
        let extraction = extract(raw, &stage().contract);
        let out = StageOutput {
            extraction: &extraction,
            snapshot: None,
            receipt: None,
        };
        serde_json::from_value(finish(&out, ctx)).unwrap()
    }

    #[test]
    fn strict_analysis_is_normalized() {
        let ctx = context(&[]);
        let gaps = finish_raw(
            &ctx,
            r#"{"contentGaps": [
                  {"topic": "**Cold brew tea**", "trafficPotential": "High", "difficulty": "easy",
                   "competition": "low", "businessRelevance": "high", "priority": 1},
                  {"topic": "Tea storage", "priority": 4}
               ],
               "blogSuggestions": ["10 Cold Brew Recipes", "How to Store Tea"]}"#,
        );
        assert_eq!(gaps.content_gaps[0].topic, "Cold brew tea");
        assert_eq!(gaps.content_gaps[1].suggested_content, "Complete guide to Tea storage");
        assert_eq!(gaps.blog_suggestions[0], "10 Cold Brew Recipes");
        assert_eq!(gaps.opportunities.quick_wins, vec!["Cold brew tea", "Tea storage"]);
        assert_eq!(gaps.priority_matrix.high_priority_high_impact, vec!["Cold brew tea"]);
        assert_eq!(gaps.priority_matrix.quick_wins, vec!["Cold brew tea"]);
        assert_eq!(
            gaps.recommendations,
            vec![
                "Start with high-priority content gaps: Cold brew tea",
                "Focus on quick wins for immediate traffic gains",
                "Target low-competition topics for easier ranking",
            ]
        );
    }

    #[test]
    fn prose_answer_uses_research_gaps() {
        let research: Vec<String> = (1..=9).map(|i| format!("Research gap {i}")).collect();
        let refs: Vec<&str> = research.iter().map(String::as_str).collect();
        let ctx = context(&refs);
        let gaps = finish_raw(
            &ctx,
            "Good ideas would be:\n1. \"Why loose leaf beats bags\"\n2. \"A beginner's matcha guide\"",
        );

        assert_eq!(gaps.content_gaps.len(), 8);
        assert_eq!(gaps.content_gaps[0].traffic_potential, "high");
        assert_eq!(gaps.content_gaps[3].traffic_potential, "medium");
        assert_eq!(gaps.content_gaps[3].competition, "low");
        assert_eq!(gaps.content_gaps[5].difficulty, "medium");
        assert_eq!(gaps.opportunities.quick_wins.len(), 3);
        assert_eq!(gaps.opportunities.long_term_projects.len(), 3);
        assert_eq!(
            gaps.opportunities.seasonal_content,
            vec!["Research gap 7", "Research gap 8"]
        );
        assert_eq!(
            gaps.blog_suggestions,
            vec!["Why loose leaf beats bags", "A beginner's matcha guide"]
        );
    }

    #[test]
    fn gap_lookup_ignores_case() {
        let analysis = GapAnalysis {
            content_gaps: basic_gaps(&["Cold Brew Tea Recipes".into()]),
            ..GapAnalysis::default()
        };
        assert!(analysis.gap_for("cold brew").is_some());
        assert!(analysis.gap_for("matcha").is_none());
    }
}
