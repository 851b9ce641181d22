//! Types for the transcoder module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The deliverable a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Audio-only MP3.
    Audio,
    /// H.264/AAC MP4.
    Video,
}

impl OutputKind {
    /// Returns the lowercase name used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Returns the file extension of the transcoded artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "mp4",
        }
    }

    /// Returns the MIME type of the transcoded artifact.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Audio => "audio/mpeg",
            Self::Video => "video/mp4",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(format!("unknown output type '{}'", other)),
        }
    }
}

/// Fixed encoding profile for audio deliverables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioProfile {
    /// FFmpeg audio encoder.
    #[serde(default = "default_audio_codec")]
    pub codec: String,
    /// Target bitrate in kbps.
    #[serde(default = "default_audio_bitrate")]
    pub bitrate_kbps: u32,
    /// Output sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,
    /// Output channel count.
    #[serde(default = "default_channels")]
    pub channels: u8,
}

/// Fixed encoding profile for video deliverables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoProfile {
    /// Frames wider than this are scaled down, keeping aspect ratio.
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// FFmpeg video encoder.
    #[serde(default = "default_video_codec")]
    pub codec: String,
    /// Encoder speed preset.
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Constant rate factor.
    #[serde(default = "default_crf")]
    pub crf: u8,
    /// H.264 profile.
    #[serde(default = "default_h264_profile")]
    pub profile: String,
    /// H.264 level.
    #[serde(default = "default_level")]
    pub level: String,
    /// Output pixel format.
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
    /// Audio encoder for the muxed track.
    #[serde(default = "default_video_audio_codec")]
    pub audio_codec: String,
    /// Audio bitrate in kbps for the muxed track.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,
}

fn default_audio_codec() -> String {
    "libmp3lame".to_string()
}

fn default_audio_bitrate() -> u32 {
    128
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channels() -> u8 {
    2
}

fn default_max_width() -> u32 {
    1280
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_preset() -> String {
    "veryfast".to_string()
}

fn default_crf() -> u8 {
    28
}

fn default_h264_profile() -> String {
    "baseline".to_string()
}

fn default_level() -> String {
    "3.1".to_string()
}

fn default_pixel_format() -> String {
    "yuv420p".to_string()
}

fn default_video_audio_codec() -> String {
    "aac".to_string()
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self {
            codec: default_audio_codec(),
            bitrate_kbps: default_audio_bitrate(),
            sample_rate_hz: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

impl Default for VideoProfile {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            codec: default_video_codec(),
            preset: default_preset(),
            crf: default_crf(),
            profile: default_h264_profile(),
            level: default_level(),
            pixel_format: default_pixel_format(),
            audio_codec: default_video_audio_codec(),
            audio_bitrate_kbps: default_audio_bitrate(),
        }
    }
}

/// A single transcode invocation.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    /// Job identifier (the request ID), used as the gate key.
    pub job_id: String,
    /// File produced by the retrieval stage.
    pub input_path: PathBuf,
    /// Directory that receives the output (the job's scratch directory).
    pub output_dir: PathBuf,
    /// Which profile to apply.
    pub kind: OutputKind,
}

/// Outcome of a successful transcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeResult {
    /// Job identifier.
    pub job_id: String,
    /// Newly created output file.
    pub output_path: PathBuf,
    /// Output size in bytes.
    pub output_size_bytes: u64,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_kind_parsing() {
        assert_eq!("audio".parse::<OutputKind>().unwrap(), OutputKind::Audio);
        assert_eq!(" Video ".parse::<OutputKind>().unwrap(), OutputKind::Video);
        assert!("gif".parse::<OutputKind>().is_err());
    }

    #[test]
    fn test_output_kind_artifact_details() {
        assert_eq!(OutputKind::Audio.extension(), "mp3");
        assert_eq!(OutputKind::Audio.content_type(), "audio/mpeg");
        assert_eq!(OutputKind::Video.extension(), "mp4");
        assert_eq!(OutputKind::Video.content_type(), "video/mp4");
    }

    #[test]
    fn test_profile_defaults() {
        let audio = AudioProfile::default();
        assert_eq!(audio.bitrate_kbps, 128);
        assert_eq!(audio.sample_rate_hz, 44100);
        assert_eq!(audio.channels, 2);

        let video = VideoProfile::default();
        assert_eq!(video.max_width, 1280);
        assert_eq!(video.crf, 28);
        assert_eq!(video.pixel_format, "yuv420p");
    }

    #[test]
    fn test_partial_profile_deserialization() {
        let profile: VideoProfile = toml::from_str("crf = 23").unwrap();
        assert_eq!(profile.crf, 23);
        assert_eq!(profile.preset, "veryfast");
    }
}
