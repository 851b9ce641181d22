//! Serializes transcodes through their own admission pool.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::error::TranscoderError;
use super::traits::Transcoder;
use super::types::{TranscodeJob, TranscodeResult};
use crate::admission::{AdmissionController, PoolSnapshot};
use crate::metrics;

/// Name of the transcode pool in snapshots and metrics.
pub const TRANSCODE_POOL: &str = "transcode";

/// Transcode gate: an unbounded admission pool in front of a [`Transcoder`].
///
/// Jobs beyond the capacity wait in FIFO order; the gate never rejects.
#[derive(Clone)]
pub struct TranscodeGate {
    controller: Arc<AdmissionController>,
    transcoder: Arc<dyn Transcoder>,
}

impl TranscodeGate {
    /// Creates a gate allowing `max_concurrent` transcodes at a time.
    pub fn new(transcoder: Arc<dyn Transcoder>, max_concurrent: usize) -> Self {
        Self {
            controller: Arc::new(AdmissionController::unbounded(
                TRANSCODE_POOL,
                max_concurrent,
            )),
            transcoder,
        }
    }

    /// Runs the job once a transcode slot is free.
    pub async fn transcode(&self, job: TranscodeJob) -> Result<TranscodeResult, TranscoderError> {
        let transcoder = Arc::clone(&self.transcoder);
        let key = job.job_id.clone();
        let kind = job.kind;

        self.controller
            .submit(Some(&key), move |admission| async move {
                if admission.queue_ahead > 0 {
                    debug!(
                        "Transcode {} started after waiting behind {} job(s)",
                        job.job_id, admission.queue_ahead
                    );
                }

                let job_id = job.job_id.clone();
                let start = Instant::now();
                let result = transcoder.transcode(job).await;
                let outcome = match &result {
                    Ok(_) => "success",
                    Err(TranscoderError::Timeout { .. }) => "timeout",
                    Err(_) => "failure",
                };
                metrics::TRANSCODE_DURATION
                    .with_label_values(&[kind.as_str(), outcome])
                    .observe(start.elapsed().as_secs_f64());

                match &result {
                    Ok(output) => info!(
                        "Transcoded {} to {} ({} bytes, {} ms)",
                        output.job_id,
                        output.output_path.display(),
                        output.output_size_bytes,
                        output.duration_ms
                    ),
                    Err(e) => warn!("Transcode for {} failed: {}", job_id, e),
                }
                result
            })
            .await?
    }

    /// Probes for an audio stream. Probes are cheap and bypass the pool.
    pub async fn has_audio_stream(&self, path: &Path) -> Result<bool, TranscoderError> {
        self.transcoder.has_audio_stream(path).await
    }

    /// Returns the transcode pool's snapshot.
    pub fn snapshot(&self) -> PoolSnapshot {
        self.controller.snapshot()
    }

    /// Returns the underlying admission controller.
    pub fn controller(&self) -> &AdmissionController {
        &self.controller
    }

    /// Returns the wrapped transcoder.
    pub fn transcoder(&self) -> &Arc<dyn Transcoder> {
        &self.transcoder
    }
}

impl std::fmt::Debug for TranscodeGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodeGate")
            .field("transcoder", &self.transcoder.name())
            .field("pool", &self.controller.snapshot())
            .finish()
    }
}
