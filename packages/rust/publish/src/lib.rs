//! Document-publishing capability.
//!
//! Two destinations are supported: a Sanity dataset (the document body is
//! converted to portable-text blocks) and a local directory of Markdown
//! files. [`from_config`] picks one according to `[publish].target`.

pub mod blocks;
mod directory;
mod sanity;

use std::sync::Arc;

use blogsmith_shared::{AppConfig, Publisher, PublishTarget, Result, expand_home};

pub use directory::DirectoryPublisher;
pub use sanity::SanityPublisher;

/// Build the publisher selected by the config.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn Publisher>> {
    match config.publish.target {
        PublishTarget::Directory => Ok(Arc::new(DirectoryPublisher::new(expand_home(
            &config.publish.directory,
        )))),
        PublishTarget::Sanity => Ok(Arc::new(SanityPublisher::from_config(config)?)),
    }
}
