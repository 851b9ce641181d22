//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use std::path::Path;

use super::error::TranscoderError;
use super::types::{TranscodeJob, TranscodeResult};

/// Converts a retrieved media file into the canonical deliverable.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Produces exactly one new file in `job.output_dir`.
    ///
    /// Implementations never overwrite the input and remove any partial
    /// output when they fail.
    async fn transcode(&self, job: TranscodeJob) -> Result<TranscodeResult, TranscoderError>;

    /// Reports whether the file carries at least one audio stream.
    async fn has_audio_stream(&self, path: &Path) -> Result<bool, TranscoderError>;

    /// Validates that the transcoder is properly configured and ready.
    async fn validate(&self) -> Result<(), TranscoderError>;
}
