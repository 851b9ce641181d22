//! Configuration for the job pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the job pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root under which every job gets its own scratch directory.
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,

    /// Absolute byte cap for retrieved and delivered files.
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    /// Remove the scratch directory when a job fails.
    #[serde(default = "default_cleanup_on_failure")]
    pub cleanup_on_failure: bool,

    /// Grace period, in seconds, before the job start within which a file
    /// still counts as produced by the job during fallback resolution.
    #[serde(default = "default_resolve_skew")]
    pub resolve_skew_secs: u64,

    /// Look up the media's metadata before retrieving (best-effort).
    #[serde(default = "default_fetch_metadata")]
    pub fetch_metadata: bool,
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_file_size() -> u64 {
    100 * 1024 * 1024 // 100 MiB
}

fn default_cleanup_on_failure() -> bool {
    true
}

fn default_resolve_skew() -> u64 {
    60
}

fn default_fetch_metadata() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
            max_file_size_bytes: default_max_file_size(),
            cleanup_on_failure: default_cleanup_on_failure(),
            resolve_skew_secs: default_resolve_skew(),
            fetch_metadata: default_fetch_metadata(),
        }
    }
}

impl PipelineConfig {
    /// Creates a config rooted at `downloads_dir`.
    pub fn with_downloads_dir(downloads_dir: PathBuf) -> Self {
        Self {
            downloads_dir,
            ..Default::default()
        }
    }

    /// Sets the byte cap.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }
}
