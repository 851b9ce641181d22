//! Retriever module: runs the external fetch tool into a job directory.
//!
//! [`YtDlpRetriever`] invokes `yt-dlp` with a per-kind format selector, a
//! byte cap and two `--print` hooks. The hooks report the final file path on
//! stdout as `after_postprocess:<path>` / `after_move:<path>` lines; the last
//! one seen is the *declared path*. When it is missing or stale the pipeline
//! falls back to inspecting the directory.

mod config;
mod error;
mod traits;
mod types;
mod ytdlp;

pub use config::RetrieverConfig;
pub use error::RetrieverError;
pub use traits::Retriever;
pub use types::{
    filesize_flag, is_size_exceeded, parse_print_event, MediaMetadata, RetrievalOutcome,
    RetrievalRequest,
};
pub use ytdlp::YtDlpRetriever;
