//! Job pipeline: admission, retrieval, resolution, transcode and validation.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::admission::{Admission, AdmissionController, KeyStatus};
use crate::metrics::{JOBS_TOTAL, RETRIEVAL_DURATION};
use crate::retriever::{MediaMetadata, RetrievalOutcome, RetrievalRequest, Retriever};
use crate::transcoder::{OutputKind, TranscodeGate, TranscodeJob, Transcoder};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::resolve::resolve_output;
use super::types::{Delivery, Job, JobRequest, PoolsSnapshot, ValidatedRequest};
use super::validate::validate_request;

/// Name of the retrieval pool in snapshots and metrics.
pub const RETRIEVAL_POOL: &str = "retrieval";

/// Runs jobs through the retrieval and transcode pools.
///
/// Cloning is cheap; clones share both pools.
#[derive(Clone)]
pub struct JobPipeline {
    config: Arc<PipelineConfig>,
    retriever: Arc<dyn Retriever>,
    retrieval_pool: Arc<AdmissionController>,
    transcode_gate: TranscodeGate,
}

impl JobPipeline {
    /// Creates a pipeline with its own retrieval pool.
    pub fn new(
        config: PipelineConfig,
        retriever: Arc<dyn Retriever>,
        retrieval_capacity: usize,
        retrieval_queue_depth: usize,
        transcode_gate: TranscodeGate,
    ) -> Self {
        Self {
            config: Arc::new(config),
            retriever,
            retrieval_pool: Arc::new(AdmissionController::bounded(
                RETRIEVAL_POOL,
                retrieval_capacity,
                retrieval_queue_depth,
            )),
            transcode_gate,
        }
    }

    /// Builds the pipeline and its transcode gate from the loaded configuration.
    pub fn from_config(
        config: &crate::config::Config,
        retriever: Arc<dyn Retriever>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let gate = TranscodeGate::new(transcoder, config.transcode.max_concurrent);
        Self::new(
            config.pipeline.clone(),
            retriever,
            config.retrieval.max_concurrent,
            config.retrieval.max_queue_depth,
            gate,
        )
    }

    /// Returns the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validates and runs a job, returning its artifact.
    ///
    /// Malformed requests fail before admission. The job itself runs on its
    /// own task, so it completes (and cleans up) even if the caller stops
    /// waiting; an unclaimed [`Delivery`] deletes its artifact when dropped.
    pub async fn submit(&self, request: JobRequest) -> Result<Delivery, PipelineError> {
        let valid = validate_request(&request)?;

        self.retriever
            .ensure_ready()
            .await
            .map_err(|e| PipelineError::Validation(e.to_string()))?;

        let span = info_span!(
            "job",
            request_id = %valid.request_id,
            kind = %valid.kind
        );
        let this = self.clone();
        let handle = tokio::spawn(async move { this.admit(valid).await }.instrument(span));

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(PipelineError::Failure(format!("job task failed: {}", e))),
        }
    }

    /// Reports where a request ID stands in the retrieval pool.
    pub fn status(&self, request_id: &str) -> KeyStatus {
        self.retrieval_pool.status_of(request_id)
    }

    /// Returns snapshots of both pools.
    pub fn pools(&self) -> PoolsSnapshot {
        PoolsSnapshot {
            retrieval: self.retrieval_pool.snapshot(),
            transcode: self.transcode_gate.snapshot(),
        }
    }

    /// Returns the retrieval pool.
    pub fn retrieval_pool(&self) -> &AdmissionController {
        &self.retrieval_pool
    }

    /// Returns the transcode gate.
    pub fn transcode_gate(&self) -> &TranscodeGate {
        &self.transcode_gate
    }

    async fn admit(&self, valid: ValidatedRequest) -> Result<Delivery, PipelineError> {
        let kind = valid.kind;
        let key = valid.request_id.clone();

        let result = match self
            .retrieval_pool
            .submit(Some(&key), |admission| self.run(valid, admission))
            .await
        {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        JOBS_TOTAL.with_label_values(&[kind.as_str(), outcome]).inc();

        match &result {
            Ok(delivery) => info!(
                "Job ready: {} ({} bytes)",
                delivery.path.display(),
                delivery.size_bytes
            ),
            Err(PipelineError::AdmissionRejected(pool)) => warn!(
                "Rejected: {} running, {} queued (limit {})",
                pool.running, pool.queued, pool.capacity
            ),
            Err(e) => warn!("Job failed ({}): {}", e.kind(), e),
        }

        result
    }

    async fn run(&self, valid: ValidatedRequest, admission: Admission) -> Result<Delivery, PipelineError> {
        let job = Job {
            scratch_dir: self.config.downloads_dir.join(&valid.request_id),
            request_id: valid.request_id,
            link: valid.link,
            kind: valid.kind,
            started_at: SystemTime::now(),
        };
        info!(
            "Job admitted ({} ahead at submission), fetching {}",
            admission.queue_ahead, job.link
        );

        prepare_scratch_dir(&job.scratch_dir).await?;

        let result = self.execute(&job, admission.queue_ahead).await;
        if result.is_err() && self.config.cleanup_on_failure {
            remove_scratch_dir(&job.scratch_dir).await;
        }
        result
    }

    async fn execute(&self, job: &Job, queue_ahead: usize) -> Result<Delivery, PipelineError> {
        let metadata = self.fetch_metadata(job).await;

        let started = Instant::now();
        let outcome = self
            .retriever
            .retrieve(RetrievalRequest {
                link: job.link.clone(),
                kind: job.kind,
                output_dir: job.scratch_dir.clone(),
                max_filesize_bytes: Some(self.config.max_file_size_bytes),
            })
            .await
            .map_err(|e| PipelineError::Failure(format!("retrieval could not run: {}", e)))?;
        RETRIEVAL_DURATION
            .with_label_values(&[job.kind.as_str()])
            .observe(started.elapsed().as_secs_f64());

        if !outcome.success && outcome.size_exceeded() {
            return Err(self.size_exceeded(None));
        }

        let resolved = match resolve_output(
            &job.scratch_dir,
            outcome.declared_path.as_deref(),
            job.started_at,
            Duration::from_secs(self.config.resolve_skew_secs),
        )
        .await
        {
            Ok(resolved) => resolved,
            Err(e) => return Err(self.unresolved(e, &outcome)),
        };
        if !outcome.success {
            warn!(
                "Retrieval exited with {:?} but produced {}, continuing",
                outcome.exit_code,
                resolved.path.display()
            );
        }
        debug!(
            "Resolved {} ({:?})",
            resolved.path.display(),
            resolved.resolution
        );

        let transcoded = self
            .transcode_gate
            .transcode(TranscodeJob {
                job_id: job.request_id.clone(),
                input_path: resolved.path.clone(),
                output_dir: job.scratch_dir.clone(),
                kind: job.kind,
            })
            .await?;

        if let Err(e) = tokio::fs::remove_file(&resolved.path).await {
            warn!(
                "Failed to remove source {}: {}",
                resolved.path.display(),
                e
            );
        }

        let size = tokio::fs::metadata(&transcoded.output_path)
            .await
            .map_err(|e| PipelineError::Failure(format!("transcoded output unreadable: {}", e)))?
            .len();
        if size > self.config.max_file_size_bytes {
            if let Err(e) = tokio::fs::remove_file(&transcoded.output_path).await {
                warn!(
                    "Failed to remove oversized {}: {}",
                    transcoded.output_path.display(),
                    e
                );
            }
            return Err(self.size_exceeded(Some(size)));
        }

        if job.kind == OutputKind::Video {
            self.require_audio(&transcoded.output_path).await?;
        }

        Ok(Delivery::new(
            job,
            transcoded.output_path,
            size,
            queue_ahead,
            self.retrieval_pool.capacity(),
            metadata,
        ))
    }

    async fn fetch_metadata(&self, job: &Job) -> Option<MediaMetadata> {
        if !self.config.fetch_metadata {
            return None;
        }
        match self.retriever.fetch_metadata(&job.link).await {
            Ok(metadata) => {
                debug!(
                    "Metadata: title={:?} duration={:?}",
                    metadata.title, metadata.duration
                );
                Some(metadata)
            }
            Err(e) => {
                warn!("Metadata lookup failed, continuing without it: {}", e);
                None
            }
        }
    }

    async fn require_audio(&self, path: &Path) -> Result<(), PipelineError> {
        match self.transcode_gate.has_audio_stream(path).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(PipelineError::MissingAudioTrack),
            Err(e) => {
                warn!("Audio probe failed on {}: {}", path.display(), e);
                Err(PipelineError::MissingAudioTrack)
            }
        }
    }

    fn size_exceeded(&self, size_bytes: Option<u64>) -> PipelineError {
        PipelineError::SizeExceeded {
            size_bytes,
            limit_bytes: self.config.max_file_size_bytes,
        }
    }

    /// Classifies a resolution failure using what the tool reported.
    fn unresolved(&self, err: PipelineError, outcome: &RetrievalOutcome) -> PipelineError {
        if outcome.size_exceeded() {
            // The tool may skip an over-size file and still exit 0.
            return self.size_exceeded(None);
        }
        if !outcome.success {
            let detail = outcome.diagnostics.lines().last().unwrap_or("").trim();
            return PipelineError::Failure(format!(
                "retrieval exited with code {:?}: {}",
                outcome.exit_code, detail
            ));
        }
        err
    }
}

/// Creates an empty scratch directory, wiping leftovers from an earlier job.
async fn prepare_scratch_dir(dir: &Path) -> Result<(), PipelineError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Removed stale scratch directory {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(PipelineError::Failure(format!(
                "failed to clear {}: {}",
                dir.display(),
                e
            )))
        }
    }

    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        PipelineError::Failure(format!("failed to create {}: {}", dir.display(), e))
    })
}

async fn remove_scratch_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Removed scratch directory {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", dir.display(), e),
    }
}

impl std::fmt::Debug for JobPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPipeline")
            .field("retriever", &self.retriever.name())
            .field("pools", &self.pools())
            .finish()
    }
}
