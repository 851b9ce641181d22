//! Job pipeline module.
//!
//! A job moves through these stages, all inside one retrieval slot:
//!
//! 1. **Validate** the request shape and that the tool and cookie file exist
//!    (before admission, so bad requests never hold or wait for a slot).
//! 2. **Admit** through the retrieval pool, or fail fast with
//!    `AdmissionRejected` when the pool and its queue are full.
//! 3. **Metadata** lookup (best-effort).
//! 4. **Retrieve** into `downloads/<request_id>/`.
//! 5. **Resolve** the produced file: declared path, else the newest recent
//!    file, else the newest file.
//! 6. **Transcode** through the transcode gate.
//! 7. **Validate output**: byte cap, and an audio stream for video.
//! 8. **Deliver**: the returned [`Delivery`] streams the artifact and then
//!    deletes it with its directory.

mod config;
mod error;
mod orchestrator;
mod resolve;
mod types;
mod validate;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use orchestrator::{JobPipeline, RETRIEVAL_POOL};
pub use resolve::resolve_output;
pub use types::{
    sanitize_filename, Delivery, Job, JobRequest, PoolsSnapshot, Resolution, ResolvedOutput,
    ValidatedRequest,
};
pub use validate::{is_supported_link, is_valid_request_id, validate_request};

pub use crate::transcoder::OutputKind;
