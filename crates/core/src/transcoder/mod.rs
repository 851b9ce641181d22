//! Transcoder module for turning retrieved media into the deliverable format.
//!
//! The [`Transcoder`] trait abstracts the external tool; [`FfmpegTranscoder`]
//! shells out to `ffmpeg`/`ffprobe` with two fixed profiles:
//!
//! - **Audio**: MP3 (`libmp3lame`, 128 kbps, 44.1 kHz, stereo)
//! - **Video**: MP4 (H.264 baseline 3.1, at most 1280 px wide, AAC 128 kbps,
//!   `+faststart`)
//!
//! Every transcode goes through a [`TranscodeGate`], an admission pool whose
//! queue never rejects, so at most `max_concurrent` encoders run at once.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ytdls_core::transcoder::{FfmpegTranscoder, OutputKind, TranscodeGate, TranscodeJob, TranscoderConfig};
//!
//! let config = TranscoderConfig::default();
//! let gate = TranscodeGate::new(Arc::new(FfmpegTranscoder::new(config.clone())), config.max_concurrent);
//!
//! let result = gate.transcode(TranscodeJob {
//!     job_id: "abc".into(),
//!     input_path: "/downloads/abc/clip.webm".into(),
//!     output_dir: "/downloads/abc".into(),
//!     kind: OutputKind::Audio,
//! }).await?;
//! ```

mod config;
mod error;
mod ffmpeg;
mod gate;
mod traits;
mod types;

pub use config::TranscoderConfig;
pub use error::TranscoderError;
pub use ffmpeg::FfmpegTranscoder;
pub use gate::{TranscodeGate, TRANSCODE_POOL};
pub use traits::Transcoder;
pub use types::{AudioProfile, OutputKind, TranscodeJob, TranscodeResult, VideoProfile};
