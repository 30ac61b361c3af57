//! Stage 4: SEO keywords, bucketed by intent.

use blogsmith_extract::{Contract, ListLimits};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::analyze_site::SiteAnalysis;
use super::content_strategy::ContentStrategy;
use super::fields;
use super::names::{ANALYZE_SITE, CONTENT_STRATEGY, GENERATE_KEYWORDS};
use super::to_record;
use crate::context::PipelineContext;
use crate::stage::{StageOutput, StagePlan, StageSpec};

const MAX_KEYWORDS: usize = 30;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Keyword {
    pub keyword: String,
    pub category: String,
    pub search_volume: String,
    pub competition: String,
    pub difficulty: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeywordBuckets {
    pub primary: Vec<String>,
    pub long_tail: Vec<String>,
    pub question: Vec<String>,
    pub comparison: Vec<String>,
    pub local: Vec<String>,
    pub trend: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeywordSet {
    pub domain: String,
    pub keywords: Vec<Keyword>,
    pub buckets: KeywordBuckets,
}

impl KeywordSet {
    /// Keyword phrases in generation order.
    pub fn phrases(&self) -> Vec<String> {
        self.keywords.iter().map(|k| k.keyword.clone()).collect()
    }
}

pub fn stage() -> StageSpec {
    StageSpec::new(
        GENERATE_KEYWORDS,
        Contract::object_list("keyword", ListLimits::KEYWORDS),
        plan,
        finish,
    )
    .requires(&[ANALYZE_SITE, CONTENT_STRATEGY])
}

fn plan(ctx: &PipelineContext) -> StagePlan {
    let site: SiteAnalysis = ctx.record(ANALYZE_SITE);
    let strategy: ContentStrategy = ctx.record(CONTENT_STRATEGY);
    let gaps = strategy.content_gaps.iter().take(5).cloned().collect::<Vec<_>>();

    StagePlan::Generate {
        prompt: format!(
            "You are a professional SEO expert. Generate 30 SEO keywords for a {business} \
             in the {industry} industry targeting {audience}.\n\n\
             Website: {domain}\n\
             Business context: {summary}\n\
             Content gaps identified: {gaps}\n\n\
             Cover these categories:\n\
             1. primary (5-7): main business and product terms\n\
             2. longTail (8-10): specific, less competitive phrases\n\
             3. question (5-7): what, how, why, when questions\n\
             4. comparison (3-5): vs, best, alternative terms\n\
             5. local (3-5): location terms if relevant\n\
             6. trend (2-4): current trending terms in the industry\n\n\
             Respond with ONLY a JSON array of objects like:\n\
             [{{\"keyword\": \"keyword phrase\", \"category\": \"primary\", \"searchVolume\": \"high\", \
             \"competition\": \"medium\", \"difficulty\": \"easy\", \"reason\": \"why it is valuable\"}}]",
            business = site.business_type,
            industry = site.industry,
            audience = site.target_audience,
            domain = site.domain,
            summary = site.summary,
            gaps = gaps.join(", "),
        ),
    }
}

fn finish(out: &StageOutput<'_>, ctx: &PipelineContext) -> Value {
    let site: SiteAnalysis = ctx.record(ANALYZE_SITE);
    let fallback = out.extraction.is_fallback();

    let mut seen = std::collections::HashSet::new();
    let keywords: Vec<Keyword> = out
        .extraction
        .value
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(|item| keyword_from(item, fallback))
        .filter(|k| seen.insert(k.keyword.to_lowercase()))
        .take(MAX_KEYWORDS)
        .collect();

    to_record(&KeywordSet {
        domain: site.domain,
        buckets: categorize(&keywords),
        keywords,
    })
}

fn keyword_from(item: &Value, fallback: bool) -> Option<Keyword> {
    let keyword = match item {
        Value::String(s) => s.trim().to_string(),
        _ => fields::text(item, "keyword")?,
    };
    if keyword.is_empty() {
        return None;
    }
    let (default_category, default_reason) = if fallback {
        ("extracted", "Extracted from model response")
    } else {
        ("general", "")
    };
    Some(Keyword {
        keyword,
        category: fields::text_or(item, "category", default_category),
        search_volume: fields::text_or(item, "searchVolume", "medium"),
        competition: fields::text_or(item, "competition", "medium"),
        difficulty: fields::text_or(item, "difficulty", "medium"),
        reason: fields::text_or(item, "reason", default_reason),
    })
}

/// Bucket by declared category; unknown categories are inferred from the
/// phrase itself.
pub fn categorize(keywords: &[Keyword]) -> KeywordBuckets {
    let mut buckets = KeywordBuckets::default();
    for k in keywords {
        let phrase = k.keyword.clone();
        let bucket = match k.category.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "primary" => &mut buckets.primary,
            "longtail" => &mut buckets.long_tail,
            "question" => &mut buckets.question,
            "comparison" => &mut buckets.comparison,
            "local" => &mut buckets.local,
            "trend" => &mut buckets.trend,
            _ => infer_bucket(&mut buckets, &phrase),
        };
        bucket.push(phrase);
    }
    buckets
}

fn infer_bucket<'a>(buckets: &'a mut KeywordBuckets, phrase: &str) -> &'a mut Vec<String> {
    let lower = phrase.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    let has = |set: &[&str]| words.iter().any(|w| set.contains(w));

    if has(&["what", "how", "why", "when"]) {
        &mut buckets.question
    } else if has(&["vs", "versus", "best", "top"]) {
        &mut buckets.comparison
    } else if words.len() > 3 {
        &mut buckets.long_tail
    } else {
        &mut buckets.primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogsmith_extract::{ExtractionMode, extract};
    use blogsmith_shared::RunInput;

    fn finish_raw(raw: &str) -> (ExtractionMode, KeywordSet) {
        let ctx = PipelineContext::new(RunInput::new("https://leafandkettle.com"));
        let extraction = extract(raw, &stage().contract);
        let out = StageOutput {
            extraction: &extraction,
            snapshot: None,
            receipt: None,
        };
        let set = serde_json::from_value(finish(&out, &ctx)).unwrap();
        (extraction.mode, set)
    }

    #[test]
    fn strict_keywords_keep_their_categories() {
        let (mode, set) = finish_raw(
            r#"```json
            [
              {"keyword": "loose leaf tea", "category": "primary", "searchVolume": "high"},
              {"keyword": "how to brew oolong", "category": "question"},
              {"keyword": "Loose Leaf Tea", "category": "primary"},
              {"keyword": "tea shop near me", "category": "local"}
            ]
            ```"#,
        );
        assert_eq!(mode, ExtractionMode::Strict);
        assert_eq!(set.phrases(), vec!["loose leaf tea", "how to brew oolong", "tea shop near me"]);
        assert_eq!(set.keywords[0].search_volume, "high");
        assert_eq!(set.keywords[1].search_volume, "medium");
        assert_eq!(set.buckets.primary, vec!["loose leaf tea"]);
        assert_eq!(set.buckets.question, vec!["how to brew oolong"]);
        assert_eq!(set.buckets.local, vec!["tea shop near me"]);
    }

    #[test]
    fn fallback_keywords_are_auto_categorized() {
        let (mode, set) = finish_raw(
            "Here are some keywords:\n\
             1. green tea\n\
             2. what is matcha\n\
             3. best teapot for beginners\n\
             - cold brew tea at home recipe\n",
        );
        assert_eq!(mode, ExtractionMode::Fallback);
        assert_eq!(set.keywords.len(), 4);
        assert_eq!(set.keywords[0].category, "extracted");
        assert_eq!(set.buckets.primary, vec!["green tea"]);
        assert_eq!(set.buckets.question, vec!["what is matcha"]);
        assert_eq!(set.buckets.comparison, vec!["best teapot for beginners"]);
        assert_eq!(set.buckets.long_tail, vec!["cold brew tea at home recipe"]);
    }

    #[test]
    fn substring_matches_do_not_trigger_buckets() {
        let keywords = vec![Keyword {
            keyword: "tea showroom".into(),
            category: "general".into(),
            ..Keyword::default()
        }];
        assert_eq!(categorize(&keywords).primary, vec!["tea showroom"]);
    }
}
