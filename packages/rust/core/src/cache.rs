//! Memoization of raw generation output, keyed by stage, prompt hash and
//! model.

use async_trait::async_trait;
use blogsmith_shared::{ModelRole, Result};
use blogsmith_storage::Storage;
use sha2::{Digest, Sha256};

#[async_trait]
pub trait StageCache: Send + Sync {
    async fn get(&self, stage: &str, input_hash: &str, model: &str) -> Result<Option<String>>;
    async fn put(&self, stage: &str, input_hash: &str, model: &str, raw_text: &str) -> Result<()>;
}

#[async_trait]
impl StageCache for Storage {
    async fn get(&self, stage: &str, input_hash: &str, model: &str) -> Result<Option<String>> {
        self.get_stage_cache(stage, input_hash, model).await
    }

    async fn put(&self, stage: &str, input_hash: &str, model: &str, raw_text: &str) -> Result<()> {
        self.set_stage_cache(stage, input_hash, model, raw_text).await
    }
}

/// SHA-256 over the stage name, model role and prompt.
pub fn input_hash(stage: &str, role: ModelRole, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stage.as_bytes());
    hasher.update(b"\n");
    hasher.update(role.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(prompt.as_bytes());
    format!("{:x}", hasher.finalize())
}
