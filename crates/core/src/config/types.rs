use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::pipeline::PipelineConfig;
use crate::retriever::RetrieverConfig;
use crate::transcoder::TranscoderConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retrieval: RetrieverConfig,
    #[serde(default)]
    pub transcode: TranscoderConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    3000
}

/// Sanitized config for API responses (local paths of secrets and raw
/// extra arguments are not exposed)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub retrieval: SanitizedRetrievalConfig,
    pub transcode: SanitizedTranscodeConfig,
    pub pipeline: SanitizedPipelineConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRetrievalConfig {
    pub binary_path: PathBuf,
    pub cookies_configured: bool,
    pub max_concurrent: usize,
    pub max_queue_depth: usize,
    pub video_format: String,
    pub audio_format: String,
    pub extra_args_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTranscodeConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub max_concurrent: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPipelineConfig {
    pub downloads_dir: PathBuf,
    pub max_file_size_bytes: u64,
    pub cleanup_on_failure: bool,
    pub fetch_metadata: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            retrieval: SanitizedRetrievalConfig {
                binary_path: config.retrieval.binary_path.clone(),
                cookies_configured: config.retrieval.cookies_path.exists(),
                max_concurrent: config.retrieval.max_concurrent,
                max_queue_depth: config.retrieval.max_queue_depth,
                video_format: config.retrieval.video_format.clone(),
                audio_format: config.retrieval.audio_format.clone(),
                extra_args_count: config.retrieval.extra_args.len(),
            },
            transcode: SanitizedTranscodeConfig {
                ffmpeg_path: config.transcode.ffmpeg_path.clone(),
                ffprobe_path: config.transcode.ffprobe_path.clone(),
                max_concurrent: config.transcode.max_concurrent,
                timeout_secs: config.transcode.timeout_secs,
            },
            pipeline: SanitizedPipelineConfig {
                downloads_dir: config.pipeline.downloads_dir.clone(),
                max_file_size_bytes: config.pipeline.max_file_size_bytes,
                cleanup_on_failure: config.pipeline.cleanup_on_failure,
                fetch_metadata: config.pipeline.fetch_metadata,
            },
        }
    }
}
