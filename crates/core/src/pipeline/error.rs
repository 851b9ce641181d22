//! Error taxonomy of the job pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::admission::{AdmissionError, PoolSnapshot};
use crate::transcoder::TranscoderError;

/// Terminal outcome of a failed job.
///
/// [`kind`](Self::kind) and [`status_code`](Self::status_code) give the
/// machine-readable failure kind and HTTP status returned to callers.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("pool '{}' is full ({} running, {} queued)", .0.name, .0.running, .0.queued)]
    AdmissionRejected(PoolSnapshot),

    #[error("request '{0}' is already active or queued")]
    DuplicateRequest(String),

    #[error("file exceeds the {limit_bytes} byte limit")]
    SizeExceeded {
        size_bytes: Option<u64>,
        limit_bytes: u64,
    },

    #[error("no output file found in {}", .dir.display())]
    OutputNotFound { dir: PathBuf },

    #[error("transcode failed: {message}")]
    TranscodeFailed { message: String, diagnostics: String },

    #[error("transcode timed out after {timeout_secs} seconds")]
    TranscodeTimeout {
        timeout_secs: u64,
        diagnostics: String,
    },

    #[error("video output has no audio track")]
    MissingAudioTrack,

    #[error("{0}")]
    Failure(String),
}

impl PipelineError {
    /// Machine-readable failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::AdmissionRejected(_) => "AdmissionRejected",
            Self::DuplicateRequest(_) => "DuplicateRequest",
            Self::SizeExceeded { .. } => "SizeExceeded",
            Self::OutputNotFound { .. } => "OutputNotFound",
            Self::TranscodeFailed { .. } => "TranscodeFailed",
            Self::TranscodeTimeout { .. } => "TranscodeTimeout",
            Self::MissingAudioTrack => "MissingAudioTrack",
            Self::Failure(_) => "PipelineFailure",
        }
    }

    /// HTTP status for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::AdmissionRejected(_) => 429,
            Self::DuplicateRequest(_) => 409,
            Self::SizeExceeded { .. } => 413,
            Self::OutputNotFound { .. }
            | Self::TranscodeFailed { .. }
            | Self::TranscodeTimeout { .. }
            | Self::MissingAudioTrack
            | Self::Failure(_) => 500,
        }
    }

    /// Whether resubmitting later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AdmissionRejected(_) | Self::DuplicateRequest(_))
    }

    /// Captured tool diagnostics, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::TranscodeFailed { diagnostics, .. }
            | Self::TranscodeTimeout { diagnostics, .. }
                if !diagnostics.is_empty() =>
            {
                Some(diagnostics)
            }
            _ => None,
        }
    }
}

impl From<AdmissionError> for PipelineError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::Rejected(snapshot) => Self::AdmissionRejected(snapshot),
            AdmissionError::DuplicateKey(key) => Self::DuplicateRequest(key),
            other => Self::Failure(other.to_string()),
        }
    }
}

impl From<TranscoderError> for PipelineError {
    fn from(err: TranscoderError) -> Self {
        match err {
            TranscoderError::Timeout {
                timeout_secs,
                stderr,
            } => Self::TranscodeTimeout {
                timeout_secs,
                diagnostics: stderr,
            },
            TranscoderError::Failed { exit_code, stderr } => Self::TranscodeFailed {
                message: format!("ffmpeg exited with code {:?}", exit_code),
                diagnostics: stderr,
            },
            TranscoderError::OutputMissing { path } => Self::TranscodeFailed {
                message: format!("output not created: {}", path.display()),
                diagnostics: String::new(),
            },
            other => Self::Failure(other.to_string()),
        }
    }
}
