//! The three external capabilities the pipeline drives.
//!
//! Implementations must be `Send + Sync`; one client is shared via `Arc`
//! by every concurrent run.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Document, Generation, GenerationRequest, ModelRole, PublishReceipt, SiteSnapshot,
};

/// Turns a prompt into free-form text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Fails with [`BlogsmithError::Generation`](crate::BlogsmithError::Generation)
    /// on transport errors, non-success statuses or empty responses.
    async fn generate(&self, request: GenerationRequest) -> Result<Generation>;

    /// Model identifier used for `role`, recorded in the stage cache key.
    fn model_for(&self, role: ModelRole) -> String;
}

/// Loads a web page and reduces it to a [`SiteSnapshot`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<SiteSnapshot>;
}

/// Stores a finished document somewhere a reader can reach it.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, document: &Document) -> Result<PublishReceipt>;
}
