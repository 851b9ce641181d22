//! Error types for the retriever module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing or running the retrieval tool.
#[derive(Debug, Error)]
pub enum RetrieverError {
    /// The retrieval binary is not on disk.
    #[error("retrieval binary not found at {path}")]
    BinaryNotFound { path: PathBuf },

    /// The cookie/session file is not on disk.
    #[error("cookie file not found at {path}")]
    CookiesNotFound { path: PathBuf },

    /// The metadata document could not be produced or parsed.
    #[error("metadata lookup failed: {reason}")]
    MetadataFailed { reason: String },

    /// I/O error while spawning or supervising the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrieverError {
    /// Creates a metadata error.
    pub fn metadata(reason: impl Into<String>) -> Self {
        Self::MetadataFailed {
            reason: reason.into(),
        }
    }

    /// Whether the error means the environment is not set up (caller error).
    pub fn is_environment(&self) -> bool {
        matches!(
            self,
            Self::BinaryNotFound { .. } | Self::CookiesNotFound { .. }
        )
    }
}
