//! Application configuration for Blogsmith.
//!
//! User config lives at `~/.blogsmith/blogsmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BlogsmithError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "blogsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".blogsmith";

// ---------------------------------------------------------------------------
// Config structs (matching blogsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pipeline defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings for the generation capability.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Website fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Where finished posts are published.
    #[serde(default)]
    pub publish: PublishConfig,

    /// Run history and stage cache.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Per-stage time budget for a capability call, in seconds.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// Attempts per capability call. `1` disables retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff between attempts; doubles on each retry.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Where `create --output` writes run results when given a bare file name.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_stage_timeout() -> u64 {
    300
}
fn default_max_attempts() -> u32 {
    1
}
fn default_retry_backoff() -> u64 {
    2_000
}
fn default_output_dir() -> String {
    "~/blogsmith-runs".into()
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat completions base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for analysis and writing stages.
    #[serde(default = "default_writer_model")]
    pub writer_model: String,

    /// Search-grounded model used for the research stages.
    #[serde(default = "default_research_model")]
    pub research_model: String,

    /// Sampling temperature for writer calls.
    #[serde(default = "default_writer_temperature")]
    pub writer_temperature: f32,

    /// Sampling temperature for research calls.
    #[serde(default = "default_research_temperature")]
    pub research_temperature: f32,

    /// Upper bound on generated tokens per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            writer_model: default_writer_model(),
            research_model: default_research_model(),
            writer_temperature: default_writer_temperature(),
            research_temperature: default_research_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_writer_model() -> String {
    "google/gemini-2.0-flash-001".into()
}
fn default_research_model() -> String {
    "perplexity/sonar".into()
}
fn default_writer_temperature() -> f32 {
    0.7
}
fn default_research_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    8192
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Timeout for the site fetch in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header sent with the fetch.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum characters of body text kept in the site snapshot.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
}
fn default_max_text_chars() -> usize {
    2_000
}

/// Publishing destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishTarget {
    /// Write Markdown + JSON files to a local directory.
    Directory,
    /// Create a document through the Sanity mutation API.
    Sanity,
}

/// `[publish]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Destination for finished posts.
    #[serde(default = "default_publish_target")]
    pub target: PublishTarget,

    /// Output directory for the directory publisher.
    #[serde(default = "default_publish_dir")]
    pub directory: String,

    /// Sanity project ID.
    #[serde(default)]
    pub sanity_project_id: String,

    /// Sanity dataset.
    #[serde(default = "default_sanity_dataset")]
    pub sanity_dataset: String,

    /// Name of the env var holding the Sanity write token.
    #[serde(default = "default_sanity_token_env")]
    pub sanity_token_env: String,

    /// Author recorded on published posts.
    #[serde(default = "default_author")]
    pub author: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            target: default_publish_target(),
            directory: default_publish_dir(),
            sanity_project_id: String::new(),
            sanity_dataset: default_sanity_dataset(),
            sanity_token_env: default_sanity_token_env(),
            author: default_author(),
        }
    }
}

fn default_publish_target() -> PublishTarget {
    PublishTarget::Directory
}
fn default_publish_dir() -> String {
    "~/blogsmith-posts".into()
}
fn default_sanity_dataset() -> String {
    "production".into()
}
fn default_sanity_token_env() -> String {
    "SANITY_API_TOKEN".into()
}
fn default_author() -> String {
    "AI Blog Writer".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the libSQL database holding run history and the stage cache.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Whether completed stage results are memoized across runs.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            cache_enabled: true,
        }
    }
}

fn default_database_path() -> String {
    "~/.blogsmith/blogsmith.db".into()
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Runtime pipeline options (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Retry behaviour for a single capability call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Delay to wait before attempt number `attempt` (1-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.backoff.saturating_mul(1 << (attempt - 2).min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Runtime options for the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Time budget for one capability call.
    pub stage_timeout: Duration,
    /// Retry policy applied to capability calls.
    pub retry: RetryPolicy,
    /// Whether the stage cache is consulted and filled.
    pub use_cache: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(default_stage_timeout()),
            retry: RetryPolicy::none(),
            use_cache: false,
        }
    }
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            stage_timeout: Duration::from_secs(config.defaults.stage_timeout_secs),
            retry: RetryPolicy {
                max_attempts: config.defaults.max_attempts.max(1),
                backoff: Duration::from_millis(config.defaults.retry_backoff_ms),
            },
            use_cache: config.storage.cache_enabled,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.blogsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BlogsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.blogsmith/blogsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BlogsmithError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        BlogsmithError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BlogsmithError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BlogsmithError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BlogsmithError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Read the OpenRouter API key from the env var named in the config.
pub fn openrouter_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(BlogsmithError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

/// Read the Sanity write token from the env var named in the config.
pub fn sanity_token(config: &AppConfig) -> Result<String> {
    let var_name = &config.publish.sanity_token_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(BlogsmithError::config(format!(
            "Sanity token not found. Set the {var_name} environment variable."
        ))),
    }
}
