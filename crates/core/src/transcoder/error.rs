//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

use crate::admission::AdmissionError;

/// Errors that can occur while transcoding or probing.
#[derive(Debug, Error)]
pub enum TranscoderError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The computed output path would overwrite the input.
    #[error("Refusing to overwrite input file: {path}")]
    WouldOverwriteInput { path: PathBuf },

    /// FFmpeg exited with a non-zero status.
    #[error("FFmpeg exited with code {exit_code:?}")]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// FFmpeg ran past the configured timeout and was killed.
    #[error("Transcode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64, stderr: String },

    /// FFmpeg reported success but the output file is missing.
    #[error("Transcode output not created: {path}")]
    OutputMissing { path: PathBuf },

    /// The transcode gate refused the job.
    #[error("Transcode admission failed: {0}")]
    Admission(#[from] AdmissionError),

    /// I/O error while supervising the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscoderError {
    /// Creates a failed error from an exit code and captured diagnostics.
    pub fn failed(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::Failed {
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Returns captured diagnostic output, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Failed { stderr, .. } | Self::Timeout { stderr, .. } if !stderr.is_empty() => {
                Some(stderr)
            }
            _ => None,
        }
    }
}
