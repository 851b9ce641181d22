//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::TranscoderConfig;
use super::error::TranscoderError;
use super::traits::Transcoder;
use super::types::{AudioProfile, OutputKind, TranscodeJob, TranscodeResult, VideoProfile};
use crate::process::{drain_capped, is_missing_binary, tool_command, MAX_DIAGNOSTIC_BYTES};

/// FFmpeg-based transcoder implementation.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    /// Returns a fresh output path `<kind>_<millis>_<random>.<ext>` in `dir`.
    pub fn output_path_for(kind: OutputKind, dir: &Path) -> PathBuf {
        let suffix = Uuid::new_v4().simple().to_string();
        dir.join(format!(
            "{}_{}_{}.{}",
            kind.as_str(),
            Utc::now().timestamp_millis(),
            &suffix[..12],
            kind.extension()
        ))
    }

    /// Builds ffmpeg arguments for the audio profile.
    fn build_audio_args(
        &self,
        input_path: &Path,
        output_path: &Path,
        profile: &AudioProfile,
    ) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-acodec".to_string(),
            profile.codec.clone(),
            "-b:a".to_string(),
            format!("{}k", profile.bitrate_kbps),
            "-ar".to_string(),
            profile.sample_rate_hz.to_string(),
            "-ac".to_string(),
            profile.channels.to_string(),
        ];

        self.push_common_args(&mut args);
        args.push(output_path.to_string_lossy().to_string());
        args
    }

    /// Builds ffmpeg arguments for the video profile.
    fn build_video_args(
        &self,
        input_path: &Path,
        output_path: &Path,
        profile: &VideoProfile,
    ) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            // Only downscale; -2 keeps the height even for yuv420p
            "-vf".to_string(),
            format!("scale='min({},iw)':-2", profile.max_width),
            "-preset".to_string(),
            profile.preset.clone(),
            "-crf".to_string(),
            profile.crf.to_string(),
            "-c:v".to_string(),
            profile.codec.clone(),
            "-profile:v".to_string(),
            profile.profile.clone(),
            "-level".to_string(),
            profile.level.clone(),
            "-pix_fmt".to_string(),
            profile.pixel_format.clone(),
            "-c:a".to_string(),
            profile.audio_codec.clone(),
            "-b:a".to_string(),
            format!("{}k", profile.audio_bitrate_kbps),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ];

        self.push_common_args(&mut args);
        args.push(output_path.to_string_lossy().to_string());
        args
    }

    fn push_common_args(&self, args: &mut Vec<String>) {
        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ]);
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());
    }

    /// Runs ffmpeg under the configured timeout.
    ///
    /// Returns the captured stderr on success. On failure or timeout the
    /// process is killed and the diagnostics travel with the error.
    async fn run_ffmpeg(&self, args: &[String]) -> Result<String, TranscoderError> {
        let mut child = tool_command(&self.config.ffmpeg_path)
            .stdout(Stdio::null())
            .args(args)
            .spawn()
            .map_err(|e| {
                if is_missing_binary(&e, &self.config.ffmpeg_path) {
                    TranscoderError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    TranscoderError::Io(e)
                }
            })?;

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_capped(stderr, MAX_DIAGNOSTIC_BYTES)));

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let waited = timeout(timeout_duration, child.wait()).await;

        let timed_out = waited.is_err();
        if timed_out {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill ffmpeg after timeout: {}", e);
            }
        }

        // The pipe closes once the process is gone, so the drain finishes.
        let stderr = match stderr_task {
            Some(task) => match task.await {
                Ok(Ok(buffer)) => buffer.into_string(),
                Ok(Err(e)) => {
                    debug!("Failed to read ffmpeg stderr: {}", e);
                    String::new()
                }
                Err(e) => {
                    debug!("ffmpeg stderr reader aborted: {}", e);
                    String::new()
                }
            },
            None => String::new(),
        };

        match waited {
            Err(_) => Err(TranscoderError::Timeout {
                timeout_secs: self.config.timeout_secs,
                stderr,
            }),
            Ok(Err(e)) => Err(TranscoderError::Io(e)),
            Ok(Ok(status)) if !status.success() => {
                Err(TranscoderError::failed(status.code(), stderr))
            }
            Ok(Ok(_)) => Ok(stderr),
        }
    }

    async fn check_binary(path: &Path) -> Result<(), std::io::Error> {
        Command::new(path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|_| ())
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn transcode(&self, job: TranscodeJob) -> Result<TranscodeResult, TranscoderError> {
        let start = Instant::now();

        if !tokio::fs::try_exists(&job.input_path).await.unwrap_or(false) {
            return Err(TranscoderError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        let output_path = Self::output_path_for(job.kind, &job.output_dir);
        if output_path == job.input_path {
            return Err(TranscoderError::WouldOverwriteInput { path: output_path });
        }

        let args = match job.kind {
            OutputKind::Audio => {
                self.build_audio_args(&job.input_path, &output_path, &self.config.audio)
            }
            OutputKind::Video => {
                self.build_video_args(&job.input_path, &output_path, &self.config.video)
            }
        };

        debug!(
            "Transcoding {} -> {} ({})",
            job.input_path.display(),
            output_path.display(),
            job.kind
        );

        if let Err(e) = self.run_ffmpeg(&args).await {
            remove_partial(&output_path).await;
            return Err(e);
        }

        let output_meta = match tokio::fs::metadata(&output_path).await {
            Ok(meta) => meta,
            Err(_) => {
                return Err(TranscoderError::OutputMissing { path: output_path });
            }
        };

        Ok(TranscodeResult {
            job_id: job.job_id,
            output_path,
            output_size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn has_audio_stream(&self, path: &Path) -> Result<bool, TranscoderError> {
        let output = tool_command(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-select_streams",
                "a:0",
                "-show_entries",
                "stream=codec_type",
                "-of",
                "default=nk=1:nw=1",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                if is_missing_binary(&e, &self.config.ffprobe_path) {
                    TranscoderError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    TranscoderError::Io(e)
                }
            })?;

        if !output.status.success() {
            warn!(
                "ffprobe failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(false);
        }

        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    async fn validate(&self) -> Result<(), TranscoderError> {
        if let Err(e) = Self::check_binary(&self.config.ffmpeg_path).await {
            if is_missing_binary(&e, &self.config.ffmpeg_path) {
                return Err(TranscoderError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(TranscoderError::Io(e));
        }

        if let Err(e) = Self::check_binary(&self.config.ffprobe_path).await {
            if is_missing_binary(&e, &self.config.ffprobe_path) {
                return Err(TranscoderError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(TranscoderError::Io(e));
        }

        Ok(())
    }
}
