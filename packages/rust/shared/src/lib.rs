//! Shared types, error model, capability traits and configuration for Blogsmith.
//!
//! This crate is the foundation depended on by all other Blogsmith crates.
//! It provides:
//! - [`BlogsmithError`], the unified error type
//! - Domain types ([`RunInput`], [`SiteSnapshot`], [`Document`], [`RunId`])
//! - Capability traits ([`Generator`], [`Fetcher`], [`Publisher`])
//! - Configuration ([`AppConfig`], [`PipelineOptions`], config loading)

pub mod capability;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use capability::{Fetcher, Generator, Publisher};
pub use config::{
    AppConfig, DefaultsConfig, FetchConfig, OpenRouterConfig, PipelineOptions, PublishConfig,
    PublishTarget, RetryPolicy, StorageConfig, config_dir, config_file_path, expand_home,
    init_config, load_config, load_config_from, openrouter_api_key, sanity_token,
};
pub use error::{BlogsmithError, ErrorKind, Result};
pub use types::{
    Document, Generation, GenerationRequest, ModelRole, PublishReceipt, RunId, RunInput,
    SiteSnapshot,
};
