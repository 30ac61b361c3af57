//! Markdown to portable-text conversion and plain-text helpers.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// One portable-text block with a single span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    #[serde(rename = "_type")]
    pub kind: &'static str,
    #[serde(rename = "_key")]
    pub key: String,
    pub style: &'static str,
    pub children: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    #[serde(rename = "_type")]
    pub kind: &'static str,
    pub text: String,
}

/// Split markdown on blank lines; `#`-prefixed paragraphs become heading
/// blocks (`h1`..`h4`, deeper levels clamp to `h4`), the rest `normal`.
pub fn markdown_to_blocks(markdown: &str) -> Vec<Block> {
    markdown
        .split("\n\n")
        .enumerate()
        .filter(|(_, p)| !p.trim().is_empty())
        .map(|(index, paragraph)| {
            let paragraph = paragraph.trim();
            let level = paragraph.chars().take_while(|c| *c == '#').count();
            if level > 0 {
                let style = match level {
                    1 => "h1",
                    2 => "h2",
                    3 => "h3",
                    _ => "h4",
                };
                block(format!("header_{index}"), style, paragraph[level..].trim())
            } else {
                block(format!("paragraph_{index}"), "normal", paragraph)
            }
        })
        .collect()
}

fn block(key: String, style: &'static str, text: &str) -> Block {
    Block {
        kind: "block",
        key,
        style,
        children: vec![Span {
            kind: "span",
            text: text.to_string(),
        }],
    }
}

/// Markdown stripped to plain prose.
pub fn plain_text(markdown: &str) -> String {
    static CODE_BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").expect("valid regex"));
    static BOLD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"));
    static ITALIC_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("valid regex"));
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[(.*?)\]\(.*?\)").expect("valid regex"));
    static INLINE_CODE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"`(.*?)`").expect("valid regex"));

    let text = CODE_BLOCK_RE.replace_all(markdown, "");
    let text = HEADING_RE.replace_all(&text, "");
    let text = BOLD_RE.replace_all(&text, "$1");
    let text = ITALIC_RE.replace_all(&text, "$1");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = INLINE_CODE_RE.replace_all(&text, "$1");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` of the plain text, cut at a word boundary, with `...`
/// when truncated.
pub fn excerpt(markdown: &str, max_chars: usize) -> String {
    let plain = plain_text(markdown);
    if plain.chars().count() <= max_chars {
        return plain;
    }

    // One extra char so a cut that lands exactly on a word end keeps the word.
    let cut: String = plain.chars().take(max_chars + 1).collect();
    let cut = match cut.rfind(' ') {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}...", cut.trim_end())
}
