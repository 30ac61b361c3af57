//! Text-generation capability backed by an OpenRouter-compatible
//! chat completions endpoint.
//!
//! Each [`ModelRole`] maps to its own model and temperature: research calls
//! go to a search-grounded model with a research system prompt, writer calls
//! to a general model.

mod wire;

use std::time::Instant;

use async_trait::async_trait;
use blogsmith_shared::{
    AppConfig, BlogsmithError, ErrorKind, Generation, GenerationRequest, Generator, ModelRole,
    Result, openrouter_api_key,
};
use reqwest::Client;
use tracing::{debug, instrument, warn};

use wire::{ChatRequest, ChatResponse, Message};

const RESEARCH_SYSTEM_PROMPT: &str =
    "You are a helpful research assistant. Provide accurate and up-to-date information.";

/// Model settings for one [`ModelRole`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
}

/// OpenRouter chat completions client.
#[derive(Clone)]
pub struct OpenRouterGenerator {
    http_client: Client,
    api_key: String,
    base_url: String,
    writer: ModelSettings,
    research: ModelSettings,
    max_tokens: u32,
}

impl std::fmt::Debug for OpenRouterGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterGenerator")
            .field("base_url", &self.base_url)
            .field("writer", &self.writer)
            .field("research", &self.research)
            .finish_non_exhaustive()
    }
}

impl OpenRouterGenerator {
    /// Create a client with explicit settings.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        writer: ModelSettings,
        research: ModelSettings,
    ) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            writer,
            research,
            max_tokens: 8192,
        }
    }

    /// Build from the `[openrouter]` config section, reading the key from
    /// the configured env var.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = openrouter_api_key(config)?;
        let or = &config.openrouter;
        Ok(Self::new(
            api_key,
            or.base_url.clone(),
            ModelSettings {
                model: or.writer_model.clone(),
                temperature: or.writer_temperature,
            },
            ModelSettings {
                model: or.research_model.clone(),
                temperature: or.research_temperature,
            },
        )
        .with_max_tokens(or.max_tokens))
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn settings(&self, role: ModelRole) -> &ModelSettings {
        match role {
            ModelRole::Writer => &self.writer,
            ModelRole::Research => &self.research,
        }
    }
}

#[async_trait]
impl Generator for OpenRouterGenerator {
    #[instrument(skip_all, fields(stage = %request.stage, role = %request.role))]
    async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
        let start = Instant::now();
        let settings = self.settings(request.role);

        let mut messages = Vec::with_capacity(2);
        if request.role == ModelRole::Research {
            messages.push(Message::system(RESEARCH_SYSTEM_PROMPT));
        }
        messages.push(Message::user(&request.prompt));

        let body = ChatRequest {
            model: &settings.model,
            messages,
            temperature: settings.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "generation request failed");
                BlogsmithError::Generation(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(%status, error = %error_text, "generation API error");
            return Err(BlogsmithError::http_status(
                ErrorKind::Generation,
                status.as_u16(),
                format!("HTTP {status}: {error_text}"),
            ));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| BlogsmithError::Generation(format!("malformed response: {e}")))?;

        // Blank content still goes to the extractor, which degrades it to the
        // stage's default shape.
        let text = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BlogsmithError::Generation("empty response from model".into()))?
            .message
            .content
            .unwrap_or_default();
        if text.trim().is_empty() {
            warn!(model = %settings.model, "model returned blank content");
        }

        let usage = chat.usage.unwrap_or_default();
        debug!(
            model = %settings.model,
            tokens_in = usage.prompt_tokens,
            tokens_out = usage.completion_tokens,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "chat completion"
        );

        Ok(Generation {
            text,
            model: chat.model.unwrap_or_else(|| settings.model.clone()),
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.completion_tokens,
        })
    }

    fn model_for(&self, role: ModelRole) -> String {
        self.settings(role).model.clone()
    }
}
