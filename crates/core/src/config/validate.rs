use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Both pools have a capacity of at least 1
/// - The byte cap and transcode timeout are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.retrieval.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "retrieval.max_concurrent must be at least 1".to_string(),
        ));
    }

    if config.transcode.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "transcode.max_concurrent must be at least 1".to_string(),
        ));
    }

    if config.transcode.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transcode.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.pipeline.max_file_size_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_file_size_bytes cannot be 0".to_string(),
        ));
    }

    Ok(())
}
