//! Error types for Blogsmith.
//!
//! Library crates use [`BlogsmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Extraction never produces an error: a degraded parse is reported through
//! the `fallback` extraction mode on the stage result instead.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all Blogsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum BlogsmithError {
    /// Missing or malformed caller input. Raised before any stage runs.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A stage declared an input that is not present in the pipeline context.
    #[error("missing dependency: stage `{stage}` requires `{missing}`")]
    Dependency { stage: String, missing: String },

    /// The text-generation capability failed (transport, status, bad payload).
    #[error("generation error: {0}")]
    Generation(String),

    /// The web-content fetch capability failed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The document-publishing capability failed.
    #[error("publish error: {0}")]
    Publish(String),

    /// A capability call exceeded the per-stage time budget.
    #[error("stage `{stage}` timed out after {}s", after.as_secs())]
    Timeout { stage: String, after: Duration },

    /// The run was cancelled by the caller while a stage was in flight.
    #[error("run cancelled")]
    Cancelled,

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A capability answered with a client error status a retry cannot fix
    /// (bad credentials, malformed request).
    #[error("{capability} rejected: {message}")]
    Rejected {
        capability: ErrorKind,
        status: u16,
        message: String,
    },

    /// Generic HTTP client error (client construction and the like).
    #[error("network error: {0}")]
    Network(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BlogsmithError>;

/// Coarse classification of an error, used in run reports and HTTP responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Dependency,
    Generation,
    Fetch,
    Publish,
    Timeout,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Dependency => "dependency",
            Self::Generation => "generation",
            Self::Fetch => "fetch",
            Self::Publish => "publish",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 4xx responses other than request timeout and rate limiting.
fn is_permanent_status(status: u16) -> bool {
    (400..500).contains(&status) && status != 408 && status != 429
}

impl BlogsmithError {
    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a dependency error for `stage` missing the input `missing`.
    pub fn dependency(stage: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::Dependency {
            stage: stage.into(),
            missing: missing.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Error for a non-success HTTP `status` returned by `capability`.
    ///
    /// Permanent client errors become [`BlogsmithError::Rejected`]; everything
    /// else maps to the capability's own variant.
    pub fn http_status(capability: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if is_permanent_status(status) {
            return Self::Rejected {
                capability,
                status,
                message,
            };
        }
        match capability {
            ErrorKind::Generation => Self::Generation(message),
            ErrorKind::Fetch => Self::Fetch(message),
            ErrorKind::Publish => Self::Publish(message),
            _ => Self::Network(message),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Dependency { .. } => ErrorKind::Dependency,
            Self::Generation(_) => ErrorKind::Generation,
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::Publish(_) => ErrorKind::Publish,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Rejected { capability, .. } => *capability,
            Self::Config { .. } | Self::Storage(_) | Self::Io { .. } | Self::Network(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether a retry of the same capability call could plausibly succeed.
    ///
    /// Only external-capability failures qualify; rejected requests,
    /// construction bugs and cancellation never do.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Generation(_)
                | Self::Fetch(_)
                | Self::Publish(_)
                | Self::Timeout { .. }
                | Self::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = BlogsmithError::validation("Website URL is required");
        assert_eq!(err.to_string(), "validation error: Website URL is required");

        let err = BlogsmithError::dependency("create-outline", "gap-analysis");
        assert_eq!(
            err.to_string(),
            "missing dependency: stage `create-outline` requires `gap-analysis`"
        );

        let err = BlogsmithError::Timeout {
            stage: "write-content".into(),
            after: Duration::from_secs(300),
        };
        assert!(err.to_string().contains("after 300s"));
    }

    #[test]
    fn kinds_and_transience() {
        assert_eq!(BlogsmithError::Generation("503".into()).kind(), ErrorKind::Generation);
        assert_eq!(BlogsmithError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(BlogsmithError::Storage("x".into()).kind(), ErrorKind::Internal);

        assert!(BlogsmithError::Fetch("reset".into()).is_transient());
        assert!(!BlogsmithError::dependency("a", "b").is_transient());
        assert!(!BlogsmithError::Cancelled.is_transient());
        assert!(!BlogsmithError::validation("no url").is_transient());
    }

    #[test]
    fn client_error_statuses_are_permanent() {
        let err = BlogsmithError::http_status(ErrorKind::Publish, 401, "HTTP 401 Unauthorized");
        assert!(matches!(err, BlogsmithError::Rejected { status: 401, .. }));
        assert_eq!(err.kind(), ErrorKind::Publish);
        assert_eq!(err.to_string(), "publish rejected: HTTP 401 Unauthorized");
        assert!(!err.is_transient());

        let err = BlogsmithError::http_status(ErrorKind::Generation, 400, "HTTP 400");
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(!err.is_transient());

        for status in [408, 429, 500, 503] {
            let err = BlogsmithError::http_status(ErrorKind::Generation, status, "busy");
            assert!(matches!(err, BlogsmithError::Generation(_)), "{status}");
            assert!(err.is_transient(), "{status}");
        }
    }
}
