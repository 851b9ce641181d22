//! Mock implementations of the external tool traits.
//!
//! These let the pipeline and the HTTP layer be exercised end to end
//! without `yt-dlp` or `ffmpeg` installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ytdls_core::testing::{MockRetriever, MockTranscoder};
//!
//! let retriever = MockRetriever::new();
//! let transcoder = MockTranscoder::new();
//!
//! // Configure mock behaviour
//! retriever.set_declare_path(false).await;
//! transcoder.set_has_audio(false).await;
//!
//! let pipeline = JobPipeline::from_config(&config, Arc::new(retriever), Arc::new(transcoder));
//! ```

mod mock_retriever;
mod mock_transcoder;

pub use mock_retriever::MockRetriever;
pub use mock_transcoder::{MockTranscoder, RecordedTranscode};
