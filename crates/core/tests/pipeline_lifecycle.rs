//! Pipeline lifecycle integration tests.
//!
//! These tests drive the job pipeline with the mock retriever and transcoder:
//! - Successful jobs stream their artifact and clean up after themselves
//! - Size, audio-track and timeout failures map to their failure kinds
//! - Output resolution falls back to the job directory
//! - Admission rejects, deduplicates and releases slots

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tempfile::TempDir;
use tokio_util::io::ReaderStream;

use ytdls_core::{
    pipeline::OutputKind,
    testing::{MockRetriever, MockTranscoder},
    Delivery, JobPipeline, JobRequest, KeyStatus, PipelineConfig, PipelineError, TranscodeGate,
    TranscoderError,
};

/// Test helper wiring a pipeline to mocks inside a temp downloads dir.
struct TestHarness {
    pipeline: JobPipeline,
    retriever: MockRetriever,
    transcoder: MockTranscoder,
    downloads: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_pool(4, 10)
    }

    fn with_pool(capacity: usize, queue_depth: usize) -> Self {
        Self::with_config(capacity, queue_depth, |c| c)
    }

    fn with_config(
        capacity: usize,
        queue_depth: usize,
        configure: impl FnOnce(PipelineConfig) -> PipelineConfig,
    ) -> Self {
        let downloads = TempDir::new().expect("Failed to create downloads dir");
        let config = configure(PipelineConfig::with_downloads_dir(
            downloads.path().to_path_buf(),
        ));

        let retriever = MockRetriever::new();
        let transcoder = MockTranscoder::new();
        let gate = TranscodeGate::new(Arc::new(transcoder.clone()), 1);
        let pipeline = JobPipeline::new(
            config,
            Arc::new(retriever.clone()),
            capacity,
            queue_depth,
            gate,
        );

        Self {
            pipeline,
            retriever,
            transcoder,
            downloads,
        }
    }

    async fn submit(&self, kind: OutputKind, request_id: &str) -> Result<Delivery, PipelineError> {
        self.pipeline
            .submit(JobRequest::new(
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                kind,
                request_id,
            ))
            .await
    }

    fn job_dir(&self, request_id: &str) -> std::path::PathBuf {
        self.downloads.path().join(request_id)
    }
}

async fn read_all(delivery: Delivery) -> Vec<u8> {
    let file = tokio::fs::File::open(&delivery.path)
        .await
        .expect("Failed to open artifact");
    let mut stream = delivery.into_stream(ReaderStream::new(file));
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.expect("Failed to read chunk"));
    }
    body
}

#[tokio::test]
async fn test_audio_job_streams_and_cleans_up() {
    let harness = TestHarness::new();
    harness.transcoder.set_output(b"ID3 fake mp3 data".to_vec()).await;

    let delivery = harness
        .submit(OutputKind::Audio, "job-audio-1")
        .await
        .expect("Job should succeed");

    assert_eq!(delivery.content_type, "audio/mpeg");
    assert_eq!(delivery.filename, "Mock Clip.mp3");
    assert_eq!(delivery.size_bytes, 17);
    assert_eq!(delivery.queue_ahead, 0);
    assert_eq!(delivery.pool_limit, 4);
    assert!(delivery.path.starts_with(harness.job_dir("job-audio-1")));

    // The retrieved source is gone once transcoded
    let entries: Vec<_> = std::fs::read_dir(harness.job_dir("job-audio-1"))
        .unwrap()
        .collect();
    assert_eq!(entries.len(), 1);

    let path = delivery.path.clone();
    let body = read_all(delivery).await;
    assert_eq!(body, b"ID3 fake mp3 data");

    assert!(!path.exists());
    assert!(!harness.job_dir("job-audio-1").exists());

    let pools = harness.pipeline.pools();
    assert_eq!(pools.retrieval.running, 0);
    assert_eq!(pools.transcode.running, 0);
    assert_eq!(pools.retrieval.total_completed, 1);
}

#[tokio::test]
async fn test_dropped_delivery_removes_artifact() {
    let harness = TestHarness::new();

    let delivery = harness.submit(OutputKind::Audio, "job-gone").await.unwrap();
    let path = delivery.path.clone();
    assert!(path.exists());

    drop(delivery);
    assert!(!path.exists());
    assert!(!harness.job_dir("job-gone").exists());
}

#[tokio::test]
async fn test_size_exceeded_reported_by_tool() {
    let harness = TestHarness::new();
    harness.retriever.set_size_exceeded().await;

    let err = harness.submit(OutputKind::Video, "job-big").await.unwrap_err();
    assert!(matches!(err, PipelineError::SizeExceeded { size_bytes: None, .. }));
    assert_eq!(err.status_code(), 413);
    assert_eq!(harness.transcoder.transcode_count().await, 0);
    assert!(!harness.job_dir("job-big").exists());
}

/// A real `yt-dlp` stand-in: skips the file, prints the size notice on
/// stdout and exits 0.
#[cfg(unix)]
#[tokio::test]
async fn test_size_notice_from_real_tool_is_413() {
    use std::os::unix::fs::PermissionsExt;
    use ytdls_core::{RetrieverConfig, YtDlpRetriever};

    let tools = TempDir::new().unwrap();
    let binary = tools.path().join("yt-dlp");
    std::fs::write(
        &binary,
        "#!/bin/sh\n\
         echo '[download] File is larger than max-filesize (209715200 bytes > 104857600 bytes). Aborting.'\n\
         exit 0\n",
    )
    .unwrap();
    std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
    let cookies = tools.path().join("cookies.txt");
    std::fs::write(&cookies, b"# Netscape HTTP Cookie File\n").unwrap();

    let downloads = TempDir::new().unwrap();
    let mut config = PipelineConfig::with_downloads_dir(downloads.path().to_path_buf());
    config.fetch_metadata = false;
    let transcoder = MockTranscoder::new();
    let pipeline = JobPipeline::new(
        config,
        Arc::new(YtDlpRetriever::new(RetrieverConfig::with_paths(binary, cookies))),
        1,
        0,
        TranscodeGate::new(Arc::new(transcoder.clone()), 1),
    );

    let err = pipeline
        .submit(JobRequest::new(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            OutputKind::Video,
            "job-huge",
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::SizeExceeded { size_bytes: None, .. }));
    assert_eq!(err.status_code(), 413);
    assert_eq!(transcoder.transcode_count().await, 0);
    assert!(!downloads.path().join("job-huge").exists());
}

#[tokio::test]
async fn test_size_exceeded_after_transcode() {
    let harness = TestHarness::with_config(4, 10, |c| c.with_max_file_size(8));
    harness.transcoder.set_output(vec![0u8; 64]).await;

    let err = harness.submit(OutputKind::Audio, "job-fat").await.unwrap_err();
    match err {
        PipelineError::SizeExceeded {
            size_bytes,
            limit_bytes,
        } => {
            assert_eq!(size_bytes, Some(64));
            assert_eq!(limit_bytes, 8);
        }
        other => panic!("Expected SizeExceeded, got {:?}", other),
    }
    assert!(!harness.job_dir("job-fat").exists());
}

#[tokio::test]
async fn test_video_without_audio_fails() {
    let harness = TestHarness::new();
    harness.transcoder.set_has_audio(false).await;

    let err = harness.submit(OutputKind::Video, "job-mute").await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingAudioTrack));
    assert_eq!(err.kind(), "MissingAudioTrack");
    assert!(!harness.job_dir("job-mute").exists());
}

#[tokio::test]
async fn test_audio_job_skips_audio_probe() {
    let harness = TestHarness::new();
    harness.transcoder.set_has_audio(false).await;

    assert!(harness.submit(OutputKind::Audio, "job-noprobe").await.is_ok());
}

#[tokio::test]
async fn test_transcode_timeout_releases_slots() {
    let harness = TestHarness::new();
    harness
        .transcoder
        .set_next_error(TranscoderError::Timeout {
            timeout_secs: 300,
            stderr: "frame=  120 fps= 30".to_string(),
        })
        .await;

    let err = harness.submit(OutputKind::Video, "job-slow").await.unwrap_err();
    assert!(matches!(err, PipelineError::TranscodeTimeout { timeout_secs: 300, .. }));
    assert_eq!(err.diagnostics(), Some("frame=  120 fps= 30"));

    let pools = harness.pipeline.pools();
    assert_eq!(pools.transcode.running, 0);
    assert_eq!(pools.retrieval.running, 0);

    // The next job gets the transcode slot
    assert!(harness.submit(OutputKind::Video, "job-after").await.is_ok());
}

#[tokio::test]
async fn test_transcode_failure_keeps_diagnostics() {
    let harness = TestHarness::new();
    harness
        .transcoder
        .set_next_error(TranscoderError::failed(Some(1), "Invalid data found"))
        .await;

    let err = harness.submit(OutputKind::Audio, "job-broken").await.unwrap_err();
    assert_eq!(err.kind(), "TranscodeFailed");
    assert_eq!(err.diagnostics(), Some("Invalid data found"));
}

#[tokio::test]
async fn test_undeclared_output_is_found_in_job_dir() {
    let harness = TestHarness::new();
    harness.retriever.set_declare_path(false).await;

    let delivery = harness.submit(OutputKind::Audio, "job-quiet").await.unwrap();
    let transcodes = harness.transcoder.recorded_transcodes().await;
    assert_eq!(transcodes.len(), 1);
    assert_eq!(
        transcodes[0].job.input_path,
        harness.job_dir("job-quiet").join("Mock Clip.webm")
    );
    drop(delivery);
}

#[tokio::test]
async fn test_no_output_is_output_not_found() {
    let harness = TestHarness::new();
    harness.retriever.set_write_file(false).await;

    let err = harness.submit(OutputKind::Audio, "job-empty").await.unwrap_err();
    assert!(matches!(err, PipelineError::OutputNotFound { .. }));
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn test_failed_exit_without_output() {
    let harness = TestHarness::new();
    harness.retriever.set_write_file(false).await;
    harness
        .retriever
        .set_exit(1, "ERROR: [youtube] dQw4w9WgXcQ: Video unavailable")
        .await;

    let err = harness.submit(OutputKind::Audio, "job-404").await.unwrap_err();
    assert_eq!(err.kind(), "PipelineFailure");
    assert!(err.to_string().contains("Video unavailable"));
}

#[tokio::test]
async fn test_failed_exit_with_output_continues() {
    let harness = TestHarness::new();
    harness.retriever.set_exit(1, "WARNING: postprocessing hiccup").await;

    assert!(harness.submit(OutputKind::Audio, "job-warn").await.is_ok());
}

#[tokio::test]
async fn test_metadata_failure_is_not_fatal() {
    let harness = TestHarness::new();
    harness.retriever.set_metadata(None).await;

    let delivery = harness.submit(OutputKind::Audio, "job-nometa").await.unwrap();
    assert!(delivery.metadata.is_none());
    assert!(delivery.filename.ends_with(".mp3"));
    assert!(delivery.filename.starts_with("audio_"));
    assert_eq!(harness.retriever.metadata_lookups().await.len(), 1);
}

#[tokio::test]
async fn test_metadata_lookup_can_be_disabled() {
    let harness = TestHarness::with_config(4, 10, |mut c| {
        c.fetch_metadata = false;
        c
    });

    harness.submit(OutputKind::Audio, "job-fast").await.unwrap();
    assert!(harness.retriever.metadata_lookups().await.is_empty());
}

#[tokio::test]
async fn test_failure_cleanup_can_be_disabled() {
    let harness = TestHarness::with_config(4, 10, |mut c| {
        c.cleanup_on_failure = false;
        c
    });
    harness.transcoder.set_has_audio(false).await;

    harness.submit(OutputKind::Video, "job-keep").await.unwrap_err();
    assert!(harness.job_dir("job-keep").exists());
}

#[tokio::test]
async fn test_stale_scratch_dir_is_wiped() {
    let harness = TestHarness::new();
    harness.retriever.set_declare_path(false).await;
    std::fs::create_dir_all(harness.job_dir("job-again")).unwrap();
    std::fs::write(harness.job_dir("job-again").join("leftover.webm"), b"old").unwrap();

    harness.submit(OutputKind::Audio, "job-again").await.unwrap();
    let transcodes = harness.transcoder.recorded_transcodes().await;
    assert!(transcodes[0].job.input_path.ends_with("Mock Clip.webm"));
}

#[tokio::test]
async fn test_invalid_request_never_reaches_retriever() {
    let harness = TestHarness::new();

    let err = harness.submit(OutputKind::Audio, "bad id!").await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert_eq!(err.status_code(), 400);

    let err = harness
        .pipeline
        .submit(JobRequest {
            link: Some("https://example.com/watch?v=x".to_string()),
            kind: Some("audio".to_string()),
            request_id: Some("job-1".to_string()),
        })
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = harness
        .pipeline
        .submit(JobRequest {
            link: Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
            kind: Some("gif".to_string()),
            request_id: Some("job-2".to_string()),
        })
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    assert_eq!(harness.retriever.retrieval_count().await, 0);
    assert_eq!(harness.pipeline.pools().retrieval.total_rejected, 0);
}

#[tokio::test]
async fn test_unready_retriever_is_validation_error() {
    let harness = TestHarness::new();
    harness.retriever.set_ready(false).await;

    let err = harness.submit(OutputKind::Audio, "job-nobin").await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert_eq!(harness.retriever.retrieval_count().await, 0);
}

#[tokio::test]
async fn test_full_pool_rejects_with_snapshot() {
    let harness = TestHarness::with_pool(1, 0);
    harness.retriever.set_duration(Duration::from_millis(300)).await;

    let pipeline = harness.pipeline.clone();
    let first = tokio::spawn(async move {
        pipeline
            .submit(JobRequest::new(
                "https://youtu.be/dQw4w9WgXcQ",
                OutputKind::Audio,
                "job-first",
            ))
            .await
    });

    // Wait until the first job holds the slot
    for _ in 0..100 {
        if harness.pipeline.pools().retrieval.running == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let err = harness.submit(OutputKind::Audio, "job-second").await.unwrap_err();
    match &err {
        PipelineError::AdmissionRejected(pool) => {
            assert_eq!(pool.running, 1);
            assert_eq!(pool.queued, 0);
            assert_eq!(pool.capacity, 1);
            assert_eq!(pool.max_queue_depth, Some(0));
        }
        other => panic!("Expected AdmissionRejected, got {:?}", other),
    }
    assert_eq!(err.status_code(), 429);
    assert!(err.is_retryable());

    assert!(first.await.unwrap().is_ok());
    assert_eq!(harness.pipeline.pools().retrieval.total_rejected, 1);
}

#[tokio::test]
async fn test_duplicate_request_id_is_conflict() {
    let harness = TestHarness::new();
    harness.retriever.set_duration(Duration::from_millis(300)).await;

    let pipeline = harness.pipeline.clone();
    let first = tokio::spawn(async move {
        pipeline
            .submit(JobRequest::new(
                "https://youtu.be/dQw4w9WgXcQ",
                OutputKind::Audio,
                "job-dup",
            ))
            .await
    });

    for _ in 0..100 {
        if harness.pipeline.status("job-dup").is_present() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(matches!(
        harness.pipeline.status("job-dup"),
        KeyStatus::Active { .. }
    ));

    let err = harness.submit(OutputKind::Audio, "job-dup").await.unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateRequest(ref id) if id == "job-dup"));
    assert_eq!(err.status_code(), 409);

    assert!(first.await.unwrap().is_ok());
    assert_eq!(harness.pipeline.status("job-dup"), KeyStatus::NotFound);
}

#[tokio::test]
async fn test_queued_job_reports_queue_ahead() {
    let harness = TestHarness::with_pool(1, 5);
    harness.retriever.set_duration(Duration::from_millis(150)).await;

    let mut handles = Vec::new();
    for i in 0..3 {
        let pipeline = harness.pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline
                .submit(JobRequest::new(
                    "https://youtu.be/dQw4w9WgXcQ",
                    OutputKind::Audio,
                    format!("job-q{}", i),
                ))
                .await
        }));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let mut ahead = Vec::new();
    for handle in handles {
        let delivery = handle.await.unwrap().expect("Queued job should succeed");
        ahead.push(delivery.queue_ahead);
    }
    assert_eq!(ahead, vec![0, 1, 2]);
    assert_eq!(harness.transcoder.peak_concurrency(), 1);
}
