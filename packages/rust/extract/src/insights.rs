//! Insight mining over research prose.
//!
//! Research answers are usually narrative text with links and lists rather
//! than JSON. Each [`InsightKind`] has its own trigger (a regex, a keyword
//! set or a list-line test), length window and cap.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What to pull out of free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// `http(s)` links, at most 10.
    Urls,
    /// Content formats named in the text, from a fixed vocabulary.
    ContentTypes,
    /// Numbered or bulleted lines of 10 to 100 characters, at most 10.
    ContentGaps,
    /// Sentences that point at something worth writing, at most 8.
    Opportunities,
    /// Sentences about what is trending or in demand, at most 5.
    TrendingTopics,
    /// Phrases after "publishes", "covers", "focuses on", at most 10.
    CurrentContent,
}

const CONTENT_TYPES: &[&str] = &[
    "blog",
    "product",
    "category",
    "guide",
    "review",
    "comparison",
    "tutorial",
    "news",
    "feature",
];

const OPPORTUNITY_TRIGGERS: &[&str] = &[
    "opportunity",
    "should write",
    "could create",
    "missing",
    "trending",
    "popular",
];

const TREND_TRIGGERS: &[&str] = &[
    "trending",
    "popular",
    "hot topic",
    "emerging",
    "growing",
    "demand",
];

/// Mine `text` for insights of `kind`, deduplicated in encounter order.
pub fn mine(text: &str, kind: InsightKind) -> Vec<String> {
    match kind {
        InsightKind::Urls => urls(text),
        InsightKind::ContentTypes => content_types(text),
        InsightKind::ContentGaps => content_gaps(text),
        InsightKind::Opportunities => sentences_with(text, OPPORTUNITY_TRIGGERS, 20, 150, 8),
        InsightKind::TrendingTopics => sentences_with(text, TREND_TRIGGERS, 15, 100, 5),
        InsightKind::CurrentContent => current_content(text),
    }
}

/// Keeps the first occurrence of each item, up to `cap` items.
struct Collector {
    seen: HashSet<String>,
    items: Vec<String>,
    cap: usize,
}

impl Collector {
    fn new(cap: usize) -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
            cap,
        }
    }

    fn full(&self) -> bool {
        self.items.len() >= self.cap
    }

    fn push(&mut self, item: &str) {
        if !self.full() && self.seen.insert(item.to_string()) {
            self.items.push(item.to_string());
        }
    }
}

fn within(text: &str, min: usize, max: usize) -> bool {
    let len = text.chars().count();
    len >= min && len <= max
}

fn urls(text: &str) -> Vec<String> {
    static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"https?://(?:www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b[-a-zA-Z0-9()@:%_+.~#?&/=]*",
        )
        .expect("valid regex")
    });

    let mut out = Collector::new(10);
    for m in URL_RE.find_iter(text) {
        let url = m
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
        out.push(url);
        if out.full() {
            break;
        }
    }
    out.items
}

fn content_types(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    CONTENT_TYPES
        .iter()
        .filter(|kw| lower.contains(*kw))
        .map(|kw| (*kw).to_string())
        .collect()
}

fn content_gaps(text: &str) -> Vec<String> {
    static LIST_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\s*(?:\d+\.|[-*•])\s*").expect("valid regex"));

    let mut out = Collector::new(10);
    for line in text.lines() {
        let Some(marker) = LIST_RE.find(line) else {
            continue;
        };
        let gap = line[marker.end()..].replace("**", "");
        let gap = gap.trim();
        if within(gap, 10, 100) {
            out.push(gap);
        }
        if out.full() {
            break;
        }
    }
    out.items
}

fn sentences_with(
    text: &str,
    triggers: &[&str],
    min: usize,
    max: usize,
    cap: usize,
) -> Vec<String> {
    static SENTENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid regex"));

    let mut out = Collector::new(cap);
    for sentence in SENTENCE_RE.split(text) {
        let lower = sentence.to_lowercase();
        if !triggers.iter().any(|t| lower.contains(t)) {
            continue;
        }
        let sentence = sentence.trim();
        if within(sentence, min, max) {
            out.push(sentence);
        }
        if out.full() {
            break;
        }
    }
    out.items
}

fn current_content(text: &str) -> Vec<String> {
    static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
        [
            r"(?i)publish(?:es|ing)?\s+([^.\n]+)",
            r"(?i)content\s+about\s+([^.\n]+)",
            r"(?i)cover(?:s|ing)?\s+([^.\n]+)",
            r"(?i)focus(?:es)?\s+on\s+([^.\n]+)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    });

    let mut out = Collector::new(10);
    for re in PATTERNS.iter() {
        for caps in re.captures_iter(text) {
            let phrase = caps[1].trim();
            if within(phrase, 4, 49) {
                out.push(phrase);
            }
        }
    }
    out.items
}
