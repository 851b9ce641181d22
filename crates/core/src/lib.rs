pub mod admission;
pub mod config;
pub mod delivery;
pub mod metrics;
pub mod pipeline;
pub mod process;
pub mod retriever;
pub mod testing;
pub mod transcoder;

pub use admission::{Admission, AdmissionController, AdmissionError, KeyStatus, PoolSnapshot};
pub use config::{
    config_path_from_env, load_config, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig, ServerConfig, CONFIG_ENV_VAR,
};
pub use delivery::{CleanupGuard, GuardedStream};
pub use pipeline::{Delivery, JobPipeline, JobRequest, PipelineConfig, PipelineError, PoolsSnapshot};
pub use retriever::{Retriever, RetrieverConfig, RetrieverError, YtDlpRetriever};
pub use transcoder::{
    FfmpegTranscoder, OutputKind, TranscodeGate, Transcoder, TranscoderConfig, TranscoderError,
};
