//! Mock transcoder for testing.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::transcoder::{
    FfmpegTranscoder, TranscodeJob, TranscodeResult, Transcoder, TranscoderError,
};

/// A recorded transcode job for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedTranscode {
    /// The job that was submitted.
    pub job: TranscodeJob,
    /// Whether the transcode succeeded.
    pub success: bool,
}

/// Mock implementation of the Transcoder trait.
///
/// Writes a fixed payload as the output file, optionally after a delay, and
/// tracks how many transcodes ran at the same time.
#[derive(Debug, Clone)]
pub struct MockTranscoder {
    transcodes: Arc<RwLock<Vec<RecordedTranscode>>>,
    next_error: Arc<RwLock<Option<TranscoderError>>>,
    duration_ms: Arc<RwLock<u64>>,
    output: Arc<RwLock<Vec<u8>>>,
    has_audio: Arc<RwLock<bool>>,
    running: Arc<AtomicUsize>,
    peak_running: Arc<AtomicUsize>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a new mock transcoder.
    pub fn new() -> Self {
        Self {
            transcodes: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            duration_ms: Arc::new(RwLock::new(0)),
            output: Arc::new(RwLock::new(b"transcoded media payload".to_vec())),
            has_audio: Arc::new(RwLock::new(true)),
            running: Arc::new(AtomicUsize::new(0)),
            peak_running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all recorded transcodes.
    pub async fn recorded_transcodes(&self) -> Vec<RecordedTranscode> {
        self.transcodes.read().await.clone()
    }

    /// Get the number of transcodes attempted.
    pub async fn transcode_count(&self) -> usize {
        self.transcodes.read().await.len()
    }

    /// Highest number of transcodes observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }

    /// Configure the next transcode to fail with the given error.
    pub async fn set_next_error(&self, error: TranscoderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated transcode duration.
    pub async fn set_duration(&self, duration: Duration) {
        *self.duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Set the bytes written as output.
    pub async fn set_output(&self, bytes: impl Into<Vec<u8>>) {
        *self.output.write().await = bytes.into();
    }

    /// Set what audio probes report.
    pub async fn set_has_audio(&self, has_audio: bool) {
        *self.has_audio.write().await = has_audio;
    }

    async fn run(&self, job: &TranscodeJob) -> Result<TranscodeResult, TranscoderError> {
        let duration_ms = *self.duration_ms.read().await;
        if duration_ms > 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        if !tokio::fs::try_exists(&job.input_path).await.unwrap_or(false) {
            return Err(TranscoderError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        let output_path = FfmpegTranscoder::output_path_for(job.kind, &job.output_dir);
        let bytes = self.output.read().await.clone();
        tokio::fs::write(&output_path, &bytes).await?;

        Ok(TranscodeResult {
            job_id: job.job_id.clone(),
            output_path,
            output_size_bytes: bytes.len() as u64,
            duration_ms,
        })
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcode(&self, job: TranscodeJob) -> Result<TranscodeResult, TranscoderError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(now, Ordering::SeqCst);

        let result = self.run(&job).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        self.transcodes.write().await.push(RecordedTranscode {
            job,
            success: result.is_ok(),
        });
        result
    }

    async fn has_audio_stream(&self, path: &Path) -> Result<bool, TranscoderError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(TranscoderError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(*self.has_audio.read().await)
    }

    async fn validate(&self) -> Result<(), TranscoderError> {
        Ok(())
    }
}
