//! Configuration for the retriever module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the yt-dlp retriever and the retrieval pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Path to the yt-dlp binary.
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,

    /// Netscape-format cookie file passed with `--cookies`.
    #[serde(default = "default_cookies_path")]
    pub cookies_path: PathBuf,

    /// Maximum concurrent retrieval jobs.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum jobs waiting for a retrieval slot (0 = reject when busy).
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,

    /// Format selector used for video jobs.
    #[serde(default = "default_video_format")]
    pub video_format: String,

    /// Format selector used for audio jobs.
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// Container the video streams are merged into.
    #[serde(default = "default_merge_format")]
    pub merge_output_format: String,

    /// Output filename template, relative to the job's scratch directory.
    #[serde(default = "default_output_template")]
    pub output_template: String,

    /// Additional arguments appended before the link.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_binary_path() -> PathBuf {
    PathBuf::from("bin/yt-dlp")
}

fn default_cookies_path() -> PathBuf {
    PathBuf::from("cookies.txt")
}

fn default_max_concurrent() -> usize {
    4
}

fn default_max_queue_depth() -> usize {
    10
}

fn default_video_format() -> String {
    "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/b".to_string()
}

fn default_audio_format() -> String {
    "ba/b".to_string()
}

fn default_merge_format() -> String {
    "mp4".to_string()
}

fn default_output_template() -> String {
    "%(title)s.%(ext)s".to_string()
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            cookies_path: default_cookies_path(),
            max_concurrent: default_max_concurrent(),
            max_queue_depth: default_max_queue_depth(),
            video_format: default_video_format(),
            audio_format: default_audio_format(),
            merge_output_format: default_merge_format(),
            output_template: default_output_template(),
            extra_args: Vec::new(),
        }
    }
}

impl RetrieverConfig {
    /// Creates a config pointing at a specific binary and cookie file.
    pub fn with_paths(binary_path: PathBuf, cookies_path: PathBuf) -> Self {
        Self {
            binary_path,
            cookies_path,
            ..Default::default()
        }
    }
}
