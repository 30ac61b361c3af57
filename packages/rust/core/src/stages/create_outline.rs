//! Stage 7: outline the post for the chosen topic.

use blogsmith_extract::Contract;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::analyze_site::SiteAnalysis;
use super::fields;
use super::gap_analysis::GapAnalysis;
use super::generate_keywords::KeywordSet;
use super::names::{ANALYZE_SITE, CREATE_OUTLINE, GAP_ANALYSIS, GENERATE_KEYWORDS};
use super::to_record;
use crate::context::PipelineContext;
use crate::stage::{StageOutput, StagePlan, StageSpec};
use crate::topic::chosen_topic;

const DEFAULT_WORD_COUNT: u64 = 2000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutlineSection {
    pub heading: String,
    /// `h1`, `h2` or `h3`.
    #[serde(rename = "type")]
    pub level: String,
    pub word_count: u64,
    pub key_points: Vec<String>,
    pub seo_notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeoStrategy {
    pub primary_keyword: String,
    pub secondary_keywords: Vec<String>,
    pub internal_linking_opportunities: Vec<String>,
    pub featured_snippet_opportunity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentBrief {
    pub purpose: String,
    pub target_audience: String,
    pub content_goals: Vec<String>,
    pub competitive_landscape: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WritingGuidelines {
    pub tone: String,
    pub style: String,
    pub perspective: String,
    pub include_examples: bool,
    pub include_stats: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Outline {
    pub topic: String,
    pub title: String,
    pub meta_description: String,
    pub slug: String,
    pub target_keywords: Vec<String>,
    pub estimated_word_count: u64,
    pub sections: Vec<OutlineSection>,
    pub seo_strategy: SeoStrategy,
    pub call_to_action: String,
    pub content_brief: ContentBrief,
    pub writing_guidelines: WritingGuidelines,
}

pub fn stage() -> StageSpec {
    StageSpec::new(CREATE_OUTLINE, Contract::object(), plan, finish).requires(&[
        ANALYZE_SITE,
        GENERATE_KEYWORDS,
        GAP_ANALYSIS,
    ])
}

/// Keywords the outline targets: the caller's, else those of the gap
/// matching the topic, else the first three generated keywords.
fn target_keywords(ctx: &PipelineContext, topic: &str) -> Vec<String> {
    let caller: Vec<String> = ctx
        .input()
        .target_keywords
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if !caller.is_empty() {
        return caller;
    }

    let gaps: GapAnalysis = ctx.record(GAP_ANALYSIS);
    if let Some(gap) = gaps.gap_for(topic).filter(|g| !g.target_keywords.is_empty()) {
        return gap.target_keywords.clone();
    }

    ctx.record::<KeywordSet>(GENERATE_KEYWORDS)
        .phrases()
        .into_iter()
        .take(3)
        .collect()
}

fn plan(ctx: &PipelineContext) -> StagePlan {
    let site: SiteAnalysis = ctx.record(ANALYZE_SITE);
    let topic = chosen_topic(ctx);
    let keywords = target_keywords(ctx, topic);
    let keywords = if keywords.is_empty() {
        "SEO optimized".to_string()
    } else {
        keywords.join(", ")
    };

    StagePlan::Generate {
        prompt: format!(
            "You are an SEO content strategist. Create a comprehensive blog post outline for: \"{topic}\"\n\n\
             Context:\n\
             - Website: {domain} ({business} in {industry})\n\
             - Target keywords: {keywords}\n\
             - Word count target: 1500-2500 words\n\n\
             Respond with ONLY this JSON structure:\n\
             {{\"title\": \"SEO title with the primary keyword\", \
             \"metaDescription\": \"155-character meta description\", \
             \"slug\": \"url-friendly-slug\", \
             \"targetKeywords\": [\"primary\", \"secondary\"], \
             \"estimatedWordCount\": 2000, \
             \"outline\": [{{\"heading\": \"Introduction\", \"type\": \"h2\", \"wordCount\": 200, \
             \"keyPoints\": [\"...\"], \"seoNotes\": \"...\"}}], \
             \"seoStrategy\": {{\"primaryKeyword\": \"...\", \"secondaryKeywords\": [\"...\"], \
             \"internalLinkingOpportunities\": [\"...\"], \"featuredSnippetOpportunity\": \"...\"}}, \
             \"callToAction\": \"...\"}}",
            domain = site.domain,
            business = site.business_type,
            industry = site.industry,
        ),
    }
}

fn finish(out: &StageOutput<'_>, ctx: &PipelineContext) -> Value {
    let site: SiteAnalysis = ctx.record(ANALYZE_SITE);
    let topic = chosen_topic(ctx).to_string();
    let keywords = target_keywords(ctx, &topic);
    let value = &out.extraction.value;

    let sections: Vec<OutlineSection> = ["outline", "sections"]
        .iter()
        .map(|key| fields::items(value, key))
        .find(|items| !items.is_empty())
        .unwrap_or(&[])
        .iter()
        .filter_map(section_from)
        .collect();

    let mut outline = match fields::text(value, "title") {
        Some(title) if !sections.is_empty() => Outline {
            slug: fields::slug_from(&[
                fields::text(value, "slug").as_deref().unwrap_or_default(),
                title.as_str(),
                topic.as_str(),
            ]),
            meta_description: fields::text(value, "metaDescription")
                .unwrap_or_else(|| default_meta_description(&topic)),
            target_keywords: Some(fields::list(value, "targetKeywords"))
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| keywords.clone()),
            estimated_word_count: fields::number(value, "estimatedWordCount")
                .unwrap_or(DEFAULT_WORD_COUNT),
            seo_strategy: value
                .get("seoStrategy")
                .map(seo_strategy_from)
                .unwrap_or_default(),
            call_to_action: fields::text_or(value, "callToAction", ""),
            title,
            sections,
            ..Outline::default()
        },
        _ => basic_outline(&topic, &keywords),
    };

    if outline.seo_strategy.primary_keyword.is_empty() {
        outline.seo_strategy.primary_keyword = outline
            .target_keywords
            .first()
            .cloned()
            .unwrap_or_else(|| topic.clone());
    }

    outline.content_brief = ContentBrief {
        purpose: format!("Address content gap: {topic}"),
        target_audience: non_empty_or(&site.target_audience, "Target customers"),
        content_goals: vec![
            "SEO traffic".into(),
            "Lead generation".into(),
            "Brand authority".into(),
        ],
        competitive_landscape: "Medium competition based on gap analysis".into(),
    };
    outline.writing_guidelines = WritingGuidelines {
        tone: non_empty_or(&site.communication_style, "Professional"),
        style: "Informative and actionable".into(),
        perspective: "Third person".into(),
        include_examples: true,
        include_stats: true,
    };
    outline.topic = topic;

    to_record(&outline)
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn section_from(value: &Value) -> Option<OutlineSection> {
    Some(OutlineSection {
        heading: fields::text(value, "heading")?,
        level: fields::text_or(value, "type", "h2").to_lowercase(),
        word_count: fields::number(value, "wordCount").unwrap_or(0),
        key_points: fields::list(value, "keyPoints"),
        seo_notes: fields::text_or(value, "seoNotes", ""),
    })
}

fn seo_strategy_from(value: &Value) -> SeoStrategy {
    SeoStrategy {
        primary_keyword: fields::text_or(value, "primaryKeyword", ""),
        secondary_keywords: fields::list(value, "secondaryKeywords"),
        internal_linking_opportunities: fields::list(value, "internalLinkingOpportunities"),
        featured_snippet_opportunity: fields::text_or(value, "featuredSnippetOpportunity", ""),
    }
}

fn default_meta_description(topic: &str) -> String {
    format!(
        "Learn everything about {topic}. Comprehensive guide with tips, strategies, and actionable insights."
    )
}

fn section(heading: String, level: &str, words: u64, points: &[&str], notes: &str) -> OutlineSection {
    OutlineSection {
        heading,
        level: level.into(),
        word_count: words,
        key_points: points.iter().map(|p| p.to_string()).collect(),
        seo_notes: notes.into(),
    }
}

/// A seven-section guide outline for `topic`.
pub fn basic_outline(topic: &str, keywords: &[String]) -> Outline {
    let title = format!("The Complete Guide to {topic}");
    let target_keywords = if keywords.is_empty() {
        vec![topic.to_string()]
    } else {
        keywords.to_vec()
    };

    Outline {
        slug: fields::slug_from(&[topic]),
        meta_description: default_meta_description(topic),
        estimated_word_count: DEFAULT_WORD_COUNT,
        sections: vec![
            section(title.clone(), "h1", 0, &[], ""),
            section(
                "Introduction".into(),
                "h2",
                200,
                &["Hook readers", "Preview main points", "Include primary keyword"],
                "Include primary keyword in first 100 words",
            ),
            section(
                format!("What is {topic}?"),
                "h2",
                300,
                &["Define the topic", "Explain importance", "Provide context"],
                "Use secondary keywords naturally",
            ),
            section(
                format!("Benefits of {topic}"),
                "h2",
                400,
                &["List key benefits", "Include examples", "Use bullet points"],
                "Include long-tail keywords",
            ),
            section(
                "How to Get Started".into(),
                "h2",
                500,
                &["Step-by-step guide", "Actionable tips", "Common mistakes to avoid"],
                "Optimize for \"how to\" queries",
            ),
            section(
                "Best Practices".into(),
                "h2",
                400,
                &["Expert recommendations", "Industry standards", "Pro tips"],
                "Use related keywords",
            ),
            section(
                "Conclusion".into(),
                "h2",
                200,
                &["Summarize key points", "Next steps", "Call to action"],
                "Reinforce primary keyword",
            ),
        ],
        seo_strategy: SeoStrategy {
            primary_keyword: target_keywords[0].clone(),
            secondary_keywords: target_keywords.iter().skip(1).cloned().collect(),
            internal_linking_opportunities: Vec::new(),
            featured_snippet_opportunity: "Yes - definition and list format".into(),
        },
        call_to_action: "Contact us to learn more about our services".into(),
        title,
        target_keywords,
        ..Outline::default()
    }
}
