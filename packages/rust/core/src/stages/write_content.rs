//! Stage 8: write the post body from the outline.

use blogsmith_extract::Contract;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::create_outline::{Outline, OutlineSection};
use super::fields;
use super::names::{CREATE_OUTLINE, WRITE_CONTENT};
use super::to_record;
use crate::context::PipelineContext;
use crate::stage::{StageOutput, StagePlan, StageSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftContent {
    /// Markdown body, without the `#` title.
    pub content: String,
    pub word_count: usize,
    pub target_word_count: u64,
    pub sections_written: usize,
    pub sections_included: Vec<String>,
}

pub fn stage() -> StageSpec {
    StageSpec::new(WRITE_CONTENT, Contract::object(), plan, finish).requires(&[CREATE_OUTLINE])
}

/// Sections the body covers: everything below the title.
fn body_sections(outline: &Outline) -> Vec<&OutlineSection> {
    outline.sections.iter().filter(|s| s.level != "h1").collect()
}

fn plan(ctx: &PipelineContext) -> StagePlan {
    let outline: Outline = ctx.record(CREATE_OUTLINE);
    let guide = &outline.writing_guidelines;
    let sections = body_sections(&outline)
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let points = if s.key_points.is_empty() {
                "Cover main aspects".to_string()
            } else {
                s.key_points.join(", ")
            };
            let notes = if s.seo_notes.is_empty() {
                "Use keywords naturally"
            } else {
                s.seo_notes.as_str()
            };
            format!(
                "{n}. {heading} ({words} words)\n   Key points: {points}\n   SEO notes: {notes}",
                n = i + 1,
                heading = s.heading,
                words = s.word_count,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let yes_no = |b: bool| if b { "Yes" } else { "No" };

    StagePlan::Generate {
        prompt: format!(
            "Write the body of this blog post.\n\n\
             Title: \"{title}\"\n\
             Target keywords: {keywords}\n\
             Tone: {tone}\n\
             Style: {style}\n\n\
             Write these sections:\n{sections}\n\n\
             Guidelines:\n\
             - write in {perspective}\n\
             - include examples: {examples}\n\
             - include statistics: {stats}\n\
             - target audience: {audience}\n\
             - use H2 headings for sections, H3 subheadings where helpful, and lists for readability\n\
             - do not repeat the title as an H1\n\n\
             Respond with ONLY a JSON object: {{\"content\": \"<the markdown body>\"}}",
            title = outline.title,
            keywords = outline.target_keywords.join(", "),
            tone = guide.tone,
            style = guide.style,
            perspective = guide.perspective.to_lowercase(),
            examples = yes_no(guide.include_examples),
            stats = yes_no(guide.include_stats),
            audience = outline.content_brief.target_audience,
        ),
    }
}

fn finish(out: &StageOutput<'_>, ctx: &PipelineContext) -> Value {
    let outline: Outline = ctx.record(CREATE_OUTLINE);
    let value = &out.extraction.value;

    // A model that ignores the JSON instruction returns plain markdown, which
    // lands in `summary`.
    let content = fields::text(value, "content")
        .or_else(|| fields::text(value, "summary"))
        .unwrap_or_else(|| out.extraction.raw_text.trim().to_string());

    let sections = body_sections(&outline);
    to_record(&DraftContent {
        word_count: fields::word_count(&content),
        target_word_count: sections.iter().map(|s| s.word_count).sum(),
        sections_written: sections.len(),
        sections_included: sections.iter().map(|s| s.heading.clone()).collect(),
        content,
    })
}
