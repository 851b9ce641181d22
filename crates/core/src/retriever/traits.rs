//! Trait definitions for the retriever module.

use async_trait::async_trait;

use super::error::RetrieverError;
use super::types::{MediaMetadata, RetrievalOutcome, RetrievalRequest};

/// Fetches remote media into a local directory.
///
/// The tool is a black box: a non-zero exit is reported through
/// [`RetrievalOutcome`], not as an error. Errors are reserved for failures to
/// run the tool at all.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns the name of this retriever implementation.
    fn name(&self) -> &str;

    /// Checks that the binary and cookie file are on disk.
    async fn ensure_ready(&self) -> Result<(), RetrieverError>;

    /// Looks up descriptive metadata without downloading.
    async fn fetch_metadata(&self, link: &str) -> Result<MediaMetadata, RetrieverError>;

    /// Runs the retrieval to completion.
    async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalOutcome, RetrieverError>;
}
