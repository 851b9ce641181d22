use std::path::Path;
use ytdls_core::{Config, JobPipeline, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    pipeline: JobPipeline,
}

impl AppState {
    pub fn new(config: Config, pipeline: JobPipeline) -> Self {
        Self { config, pipeline }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn pipeline(&self) -> &JobPipeline {
        &self.pipeline
    }

    /// Root that artifact-by-path requests are resolved against.
    pub fn downloads_dir(&self) -> &Path {
        &self.pipeline.config().downloads_dir
    }
}
