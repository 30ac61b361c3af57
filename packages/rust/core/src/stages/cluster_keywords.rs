//! Stage 5: group keywords into topic clusters.

use blogsmith_extract::Contract;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::analyze_site::SiteAnalysis;
use super::fields;
use super::generate_keywords::KeywordSet;
use super::names::{ANALYZE_SITE, CLUSTER_KEYWORDS, GENERATE_KEYWORDS};
use super::to_record;
use crate::context::PipelineContext;
use crate::stage::{StageOutput, StagePlan, StageSpec};

/// Number of clusters the keyword list is split into when the model gave
/// none.
const FALLBACK_CLUSTERS: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cluster {
    pub name: String,
    pub keywords: Vec<String>,
    pub content_type: String,
    pub traffic_potential: String,
    pub priority: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSet {
    pub total_keywords: usize,
    pub clusters: Vec<Cluster>,
}

pub fn stage() -> StageSpec {
    StageSpec::new(CLUSTER_KEYWORDS, Contract::object(), plan, finish)
        .requires(&[ANALYZE_SITE, GENERATE_KEYWORDS])
}

fn plan(ctx: &PipelineContext) -> StagePlan {
    let site: SiteAnalysis = ctx.record(ANALYZE_SITE);
    let keywords: KeywordSet = ctx.record(GENERATE_KEYWORDS);

    StagePlan::Generate {
        prompt: format!(
            "Group these SEO keywords into 5-7 topic clusters for a {industry} website.\n\n\
             Keywords: {keywords}\n\n\
             Each cluster needs a descriptive name, 3-6 related keywords, a content type \
             suggestion and a traffic potential (high, medium or low).\n\n\
             Respond with ONLY JSON:\n\
             {{\"clusters\": [{{\"name\": \"Cluster name\", \"keywords\": [\"keyword1\", \"keyword2\"], \
             \"contentType\": \"blog post\", \"trafficPotential\": \"high\", \"priority\": 1}}]}}",
            industry = site.industry,
            keywords = keywords.phrases().join(", "),
        ),
    }
}

fn finish(out: &StageOutput<'_>, ctx: &PipelineContext) -> Value {
    let all = ctx.record::<KeywordSet>(GENERATE_KEYWORDS).phrases();

    let mut clusters: Vec<Cluster> = fields::items(&out.extraction.value, "clusters")
        .iter()
        .enumerate()
        .filter_map(|(i, c)| {
            let name = fields::text(c, "name")?;
            Some(Cluster {
                name,
                keywords: fields::list(c, "keywords"),
                content_type: fields::text_or(c, "contentType", "blog post"),
                traffic_potential: fields::text_or(c, "trafficPotential", "medium"),
                priority: fields::number(c, "priority").unwrap_or(i as u64 + 1),
            })
        })
        .collect();

    if clusters.is_empty() {
        clusters = simple_clusters(&all);
    }

    to_record(&ClusterSet {
        total_keywords: all.len(),
        clusters,
    })
}

/// Split `keywords` into at most six evenly sized "Topic N" clusters.
pub fn simple_clusters(keywords: &[String]) -> Vec<Cluster> {
    if keywords.is_empty() {
        return Vec::new();
    }
    let chunk = keywords.len().div_ceil(FALLBACK_CLUSTERS);
    keywords
        .chunks(chunk)
        .enumerate()
        .map(|(i, group)| Cluster {
            name: format!("Topic {}", i + 1),
            keywords: group.to_vec(),
            content_type: "blog post".into(),
            traffic_potential: "medium".into(),
            priority: i as u64 + 1,
        })
        .collect()
}
