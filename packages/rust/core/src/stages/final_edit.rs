//! Stage 9: edit the full post and derive its publishing metadata.

use std::sync::LazyLock;

use blogsmith_extract::Contract;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::create_outline::Outline;
use super::fields;
use super::names::{CREATE_OUTLINE, FINAL_EDIT, WRITE_CONTENT};
use super::to_record;
use super::write_content::DraftContent;
use crate::context::PipelineContext;
use crate::stage::{StageOutput, StagePlan, StageSpec};

const WORDS_PER_MINUTE: usize = 200;
const DEFAULT_SEO_SCORE: u64 = 80;
/// Minimum SEO score for a post to count as ready to publish.
pub const PUBLISH_THRESHOLD: u64 = 70;
const MAX_TAGS: usize = 8;
const COMMON_TAGS: &[&str] = &["SEO", "Marketing", "Business", "Tips", "Guide"];

static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("valid regex"));
static META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\**\s*Meta Description:?\**\s*:?\s*(.+)$").expect("valid regex")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostMetadata {
    pub title: String,
    pub meta_description: String,
    pub slug: String,
    pub keywords: Vec<String>,
    pub word_count: usize,
    /// Minutes, at 200 words per minute.
    pub estimated_reading_time: usize,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeoAnalysis {
    pub overall_score: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_score: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readability_score: Option<u64>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinalDraft {
    /// Edited markdown, title included, meta description line removed.
    pub final_content: String,
    pub metadata: PostMetadata,
    pub seo_analysis: SeoAnalysis,
    pub publish_ready: bool,
}

pub fn stage() -> StageSpec {
    StageSpec::new(FINAL_EDIT, Contract::object(), plan, finish)
        .requires(&[CREATE_OUTLINE, WRITE_CONTENT])
}

/// Title heading plus the draft body.
fn assemble(outline: &Outline, draft: &DraftContent) -> String {
    format!("# {}\n\n{}", outline.title, draft.content.trim())
}

fn plan(ctx: &PipelineContext) -> StagePlan {
    let outline: Outline = ctx.record(CREATE_OUTLINE);
    let draft: DraftContent = ctx.record(WRITE_CONTENT);
    let full = assemble(&outline, &draft);

    StagePlan::Generate {
        prompt: format!(
            "Perform the final edit of this blog post.\n\n\
             Title: \"{title}\"\n\
             Target keywords: {keywords}\n\
             Current word count: {current}\n\
             Target word count: {target}\n\n\
             Content:\n{full}\n\n\
             Editing tasks: fix grammar and spelling, improve flow and transitions, keep a proper \
             H1/H2/H3 structure, use the primary keyword in the H1, the first paragraph and the \
             conclusion at 1-2% density, strengthen the call to action ({cta}), add a conclusion \
             if missing, and put a line \"Meta Description: ...\" right under the title.\n\n\
             Then score the edited post for SEO from 1 to 100.\n\n\
             Respond with ONLY this JSON structure:\n\
             {{\"finalContent\": \"<the complete edited markdown>\", \
             \"seoAnalysis\": {{\"overallScore\": 85, \"keywordScore\": 90, \"structureScore\": 80, \
             \"readabilityScore\": 85, \"recommendations\": [\"...\"]}}}}",
            title = outline.title,
            keywords = outline.target_keywords.join(", "),
            current = fields::word_count(&full),
            target = outline.estimated_word_count,
            cta = outline.call_to_action,
        ),
    }
}

fn finish(out: &StageOutput<'_>, ctx: &PipelineContext) -> Value {
    let outline: Outline = ctx.record(CREATE_OUTLINE);
    let draft: DraftContent = ctx.record(WRITE_CONTENT);
    let value = &out.extraction.value;

    let edited = ["finalContent", "content", "summary"]
        .iter()
        .find_map(|key| fields::text(value, key))
        .unwrap_or_else(|| assemble(&outline, &draft));

    let seo_analysis = value
        .get("seoAnalysis")
        .and_then(|seo| {
            let overall = fields::number(seo, "overallScore")?;
            Some(SeoAnalysis {
                overall_score: overall.min(100),
                keyword_score: fields::number(seo, "keywordScore"),
                structure_score: fields::number(seo, "structureScore"),
                readability_score: fields::number(seo, "readabilityScore"),
                recommendations: fields::list(seo, "recommendations"),
            })
        })
        .unwrap_or_else(|| SeoAnalysis {
            overall_score: DEFAULT_SEO_SCORE,
            recommendations: vec!["Manual SEO review recommended".into()],
            ..SeoAnalysis::default()
        });

    let metadata = metadata_for(&edited, &outline);
    let final_content = strip_meta_line(&edited);

    to_record(&FinalDraft {
        final_content,
        metadata,
        publish_ready: seo_analysis.overall_score >= PUBLISH_THRESHOLD,
        seo_analysis,
    })
}

/// Title from the first H1, meta description from a `Meta Description:` line,
/// both falling back to the outline.
pub fn metadata_for(content: &str, outline: &Outline) -> PostMetadata {
    let title = H1_RE
        .captures(content)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| outline.title.clone());
    let meta_description = META_RE
        .captures(content)
        .map(|c| c[1].trim().trim_matches('*').trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| outline.meta_description.clone());

    let word_count = fields::word_count(content);
    PostMetadata {
        slug: fields::slug_from(&[title.as_str(), outline.slug.as_str()]),
        categories: categories(&title, &outline.content_brief.purpose),
        tags: tags(content, &outline.target_keywords),
        keywords: outline.target_keywords.clone(),
        word_count,
        estimated_reading_time: word_count.div_ceil(WORDS_PER_MINUTE),
        title,
        meta_description,
    }
}

fn strip_meta_line(content: &str) -> String {
    let stripped = META_RE.replace(content, "");
    let mut out = String::with_capacity(stripped.len());
    let mut blank_run = 0;
    for line in stripped.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

fn categories(title: &str, purpose: &str) -> Vec<String> {
    let title = title.to_lowercase();
    let mut out = Vec::new();
    if purpose.to_lowercase().contains("guide") {
        out.push("Guides".to_string());
    }
    if title.contains("how to") {
        out.push("How-to".to_string());
    }
    if title.contains("best") {
        out.push("Reviews".to_string());
    }
    if title.contains("tips") {
        out.push("Tips".to_string());
    }
    if out.is_empty() {
        out.push("Blog".to_string());
    }
    out
}

/// Target keywords that appear in the post, then common tags that do, at most
/// eight.
fn tags(content: &str, keywords: &[String]) -> Vec<String> {
    let lower = content.to_lowercase();
    let mut out: Vec<String> = Vec::new();
    let candidates = keywords
        .iter()
        .map(String::as_str)
        .chain(COMMON_TAGS.iter().copied());
    for tag in candidates {
        if out.len() >= MAX_TAGS {
            break;
        }
        let tag = tag.trim();
        if !tag.is_empty()
            && lower.contains(&tag.to_lowercase())
            && !out.iter().any(|t| t.eq_ignore_ascii_case(tag))
        {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StageResult;
    use crate::stages::create_outline::basic_outline;
    use blogsmith_extract::{ExtractionMode, extract};
    use blogsmith_shared::RunInput;

    fn context() -> PipelineContext {
        let mut ctx = PipelineContext::new(RunInput::new("https://leafandkettle.com"));
        let outline = basic_outline("Tea Storage", &["tea storage".into(), "airtight tin".into()]);
        let draft = DraftContent {
            content: "## Introduction\n\nKeep tea dry.".into(),
            ..DraftContent::default()
        };
        for (stage, record) in [
            (CREATE_OUTLINE, to_record(&outline)),
            (WRITE_CONTENT, to_record(&draft)),
        ] {
            ctx.insert(
                stage,
                StageResult {
                    raw_text: String::new(),
                    structured: Value::Null,
                    extraction_mode: ExtractionMode::Strict,
                    duration_ms: 0,
                    record,
                    cached: false,
                },
            )
            .unwrap();
        }
        ctx
    }

    fn finish_raw(raw: &str) -> FinalDraft {
        let ctx = context();
        let extraction = extract(raw, &stage().contract);
        let out = StageOutput {
            extraction: &extraction,
            snapshot: None,
            receipt: None,
        };
        serde_json::from_value(finish(&out, &ctx)).unwrap()
    }

    #[test]
    fn prompt_includes_assembled_post() {
        let StagePlan::Generate { prompt } = plan(&context()) else {
            panic!("expected a generate plan");
        };
        assert!(prompt.contains("# The Complete Guide to Tea Storage\n\n## Introduction"));
        assert!(prompt.contains("Target word count: 2000"));
    }

    #[test]
    fn metadata_comes_from_edited_content() {
        let draft = finish_raw(
            r###"{"finalContent": "# Best Tips for Tea Storage\n\nMeta Description: Keep your tea fresh for months.\n\nUse an airtight tin. Good tea storage matters for any business.",
                  "seoAnalysis": {"overallScore": 65, "keywordScore": 70, "recommendations": ["Add links"]}}"###,
        );
        let meta = &draft.metadata;
        assert_eq!(meta.title, "Best Tips for Tea Storage");
        assert_eq!(meta.slug, "best-tips-for-tea-storage");
        assert_eq!(meta.meta_description, "Keep your tea fresh for months.");
        assert_eq!(meta.categories, vec!["Reviews", "Tips"]);
        assert_eq!(meta.tags, vec!["tea storage", "airtight tin", "Business", "Tips"]);
        assert_eq!(meta.keywords, vec!["tea storage", "airtight tin"]);
        assert_eq!(meta.estimated_reading_time, 1);
        assert_eq!(draft.seo_analysis.overall_score, 65);
        assert_eq!(draft.seo_analysis.keyword_score, Some(70));
        assert!(!draft.publish_ready);
        assert!(!draft.final_content.contains("Meta Description"));
        assert!(
            draft
                .final_content
                .starts_with("# Best Tips for Tea Storage\n\nUse an airtight tin.")
        );
    }

    #[test]
    fn prose_edit_gets_default_score() {
        let draft = finish_raw("# Storing Tea\n\nKeep it cool and dark.");
        assert_eq!(draft.metadata.title, "Storing Tea");
        assert_eq!(draft.metadata.meta_description, basic_outline("Tea Storage", &[]).meta_description);
        assert_eq!(draft.metadata.categories, vec!["Blog"]);
        assert_eq!(draft.seo_analysis.overall_score, 80);
        assert_eq!(
            draft.seo_analysis.recommendations,
            vec!["Manual SEO review recommended"]
        );
        assert!(draft.publish_ready);
    }

    #[test]
    fn non_latin_title_keeps_a_usable_slug() {
        let outline = basic_outline("Tea Storage", &[]);
        let meta = metadata_for("# 緑茶の保存方法\n\n緑茶は冷暗所で保存します。", &outline);
        assert_eq!(meta.title, "緑茶の保存方法");
        assert_eq!(meta.slug, "tea-storage");

        let outline = basic_outline("緑茶の保存", &[]);
        assert!(outline.slug.starts_with("post-"));
        let meta = metadata_for("# 緑茶の保存方法\n\n緑茶は冷暗所で保存します。", &outline);
        assert_eq!(meta.slug, outline.slug);
    }

    #[test]
    fn empty_edit_keeps_the_draft() {
        let draft = finish_raw("");
        assert_eq!(
            draft.final_content,
            "# The Complete Guide to Tea Storage\n\n## Introduction\n\nKeep tea dry."
        );
        assert_eq!(draft.metadata.title, "The Complete Guide to Tea Storage");
        assert_eq!(draft.metadata.categories, vec!["Blog"]);
    }
}
