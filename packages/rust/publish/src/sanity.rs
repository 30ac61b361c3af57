//! Sanity publisher: creates a `post` document through the mutation API.

use async_trait::async_trait;
use blogsmith_shared::{
    AppConfig, BlogsmithError, Document, ErrorKind, PublishReceipt, Publisher, Result,
    sanity_token,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::blocks::{excerpt, markdown_to_blocks};

const API_VERSION: &str = "v2021-06-07";

#[derive(Debug, Deserialize)]
struct MutateResponse {
    #[serde(default)]
    results: Vec<MutateResult>,
}

#[derive(Debug, Deserialize)]
struct MutateResult {
    id: String,
}

/// Publishes to a Sanity dataset.
#[derive(Clone)]
pub struct SanityPublisher {
    http_client: Client,
    api_base: String,
    project_id: String,
    dataset: String,
    token: String,
    author: String,
}

impl std::fmt::Debug for SanityPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SanityPublisher")
            .field("project_id", &self.project_id)
            .field("dataset", &self.dataset)
            .finish_non_exhaustive()
    }
}

impl SanityPublisher {
    pub fn new(
        project_id: impl Into<String>,
        dataset: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let project_id = project_id.into();
        Self {
            http_client: Client::new(),
            api_base: format!("https://{project_id}.api.sanity.io"),
            project_id,
            dataset: dataset.into(),
            token: token.into(),
            author: "AI Blog Writer".into(),
        }
    }

    /// Build from the `[publish]` config section.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let publish = &config.publish;
        if publish.sanity_project_id.trim().is_empty() {
            return Err(BlogsmithError::config(
                "publish.sanity_project_id must be set when publish.target = \"sanity\"",
            ));
        }
        let token = sanity_token(config)?;
        Ok(
            Self::new(&publish.sanity_project_id, &publish.sanity_dataset, token)
                .with_author(&publish.author),
        )
    }

    /// Override the API host (tests, proxies).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    fn studio_url(&self, id: &str) -> String {
        format!("https://{}.sanity.studio/desk/post;{id}", self.project_id)
    }

    /// The `create` mutation body for `document`.
    pub fn mutation(&self, document: &Document) -> Value {
        let meta = &document.metadata;
        let description = meta
            .get("metaDescription")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| excerpt(&document.body, 150));

        json!({
            "mutations": [{
                "create": {
                    "_type": "post",
                    "title": document.title,
                    "subtitle": description,
                    "slug": { "_type": "slug", "current": document.slug },
                    "body": markdown_to_blocks(&document.body),
                    "readingTime": meta.get("estimatedReadingTime").cloned().unwrap_or(Value::Null),
                    "keywords": meta.get("keywords").cloned().unwrap_or_else(|| json!([])),
                    "categories": meta.get("categories").cloned().unwrap_or_else(|| json!([])),
                    "tags": meta.get("tags").cloned().unwrap_or_else(|| json!([])),
                    "author": self.author,
                    "publishedAt": chrono::Utc::now().to_rfc3339(),
                }
            }]
        })
    }
}

#[async_trait]
impl Publisher for SanityPublisher {
    #[instrument(skip_all, fields(slug = %document.slug, dataset = %self.dataset))]
    async fn publish(&self, document: &Document) -> Result<PublishReceipt> {
        let url = format!(
            "{}/{API_VERSION}/data/mutate/{}?returnIds=true",
            self.api_base, self.dataset
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&self.mutation(document))
            .send()
            .await
            .map_err(|e| BlogsmithError::Publish(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(%status, error = %error_text, "Sanity mutation failed");
            return Err(BlogsmithError::http_status(
                ErrorKind::Publish,
                status.as_u16(),
                format!("HTTP {status}: {error_text}"),
            ));
        }

        let body: MutateResponse = response
            .json()
            .await
            .map_err(|e| BlogsmithError::Publish(format!("malformed response: {e}")))?;

        let id = body
            .results
            .into_iter()
            .next()
            .map(|r| r.id)
            .ok_or_else(|| BlogsmithError::Publish("mutation returned no document id".into()))?;

        info!(%id, "published to Sanity");
        Ok(PublishReceipt {
            url: self.studio_url(&id),
            id,
        })
    }
}
