//! Mock retriever for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::retriever::{
    MediaMetadata, RetrievalOutcome, RetrievalRequest, Retriever, RetrieverError,
};

/// What the mock does when asked to retrieve.
#[derive(Debug, Clone)]
struct RetrievalScript {
    file_name: String,
    contents: Vec<u8>,
    write_file: bool,
    declare_path: bool,
    exit_code: i32,
    diagnostics: String,
    duration: Duration,
}

impl Default for RetrievalScript {
    fn default() -> Self {
        Self {
            file_name: "Mock Clip.webm".to_string(),
            contents: b"mock media payload".to_vec(),
            write_file: true,
            declare_path: true,
            exit_code: 0,
            diagnostics: String::new(),
            duration: Duration::from_millis(0),
        }
    }
}

/// Mock implementation of the Retriever trait.
///
/// Provides controllable behavior for testing:
/// - Writes a file into the job directory like the real tool would
/// - Declares its path or stays silent (to exercise fallback resolution)
/// - Simulates exit codes, size-limit diagnostics and slow downloads
/// - Records every request for assertions
///
/// # Example
///
/// ```rust,ignore
/// use ytdls_core::testing::MockRetriever;
///
/// let retriever = MockRetriever::new();
/// retriever.set_duration(Duration::from_millis(200)).await;
/// retriever.set_declare_path(false).await;
///
/// let outcome = retriever.retrieve(request).await?;
/// assert_eq!(retriever.retrieval_count().await, 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockRetriever {
    script: Arc<RwLock<RetrievalScript>>,
    metadata: Arc<RwLock<Option<MediaMetadata>>>,
    ready: Arc<RwLock<bool>>,
    next_error: Arc<RwLock<Option<RetrieverError>>>,
    requests: Arc<RwLock<Vec<RetrievalRequest>>>,
    metadata_lookups: Arc<RwLock<Vec<String>>>,
}

impl Default for MockRetriever {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRetriever {
    /// Create a new mock retriever that succeeds with a small file.
    pub fn new() -> Self {
        Self {
            script: Arc::new(RwLock::new(RetrievalScript::default())),
            metadata: Arc::new(RwLock::new(Some(MediaMetadata {
                id: Some("mock123".to_string()),
                title: Some("Mock Clip".to_string()),
                duration: Some(42.0),
                uploader: Some("Mock Channel".to_string()),
                ext: Some("webm".to_string()),
                webpage_url: None,
            }))),
            ready: Arc::new(RwLock::new(true)),
            next_error: Arc::new(RwLock::new(None)),
            requests: Arc::new(RwLock::new(Vec::new())),
            metadata_lookups: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get all recorded retrieval requests.
    pub async fn recorded_requests(&self) -> Vec<RetrievalRequest> {
        self.requests.read().await.clone()
    }

    /// Get the number of retrievals performed.
    pub async fn retrieval_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Get the links passed to metadata lookups.
    pub async fn metadata_lookups(&self) -> Vec<String> {
        self.metadata_lookups.read().await.clone()
    }

    /// Set the name and contents of the file the tool "downloads".
    pub async fn set_output(&self, file_name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        let mut script = self.script.write().await;
        script.file_name = file_name.into();
        script.contents = contents.into();
    }

    /// Whether the tool announces the file's path.
    pub async fn set_declare_path(&self, declare: bool) {
        self.script.write().await.declare_path = declare;
    }

    /// Whether the tool writes a file at all.
    pub async fn set_write_file(&self, write: bool) {
        self.script.write().await.write_file = write;
    }

    /// Set the exit code and diagnostic output.
    pub async fn set_exit(&self, exit_code: i32, diagnostics: impl Into<String>) {
        let mut script = self.script.write().await;
        script.exit_code = exit_code;
        script.diagnostics = diagnostics.into();
    }

    /// Simulate the tool refusing an over-size file.
    pub async fn set_size_exceeded(&self) {
        let mut script = self.script.write().await;
        script.write_file = false;
        script.exit_code = 1;
        script.diagnostics =
            "[download] File is larger than max-filesize (209715200 bytes > 104857600 bytes). Aborting."
                .to_string();
    }

    /// Set the simulated retrieval duration.
    pub async fn set_duration(&self, duration: Duration) {
        self.script.write().await.duration = duration;
    }

    /// Set the metadata result; `None` makes lookups fail.
    pub async fn set_metadata(&self, metadata: Option<MediaMetadata>) {
        *self.metadata.write().await = metadata;
    }

    /// Simulate a missing binary or cookie file.
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Configure the next retrieval to fail with the given error.
    pub async fn set_next_error(&self, error: RetrieverError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    fn name(&self) -> &str {
        "mock"
    }

    async fn ensure_ready(&self) -> Result<(), RetrieverError> {
        if *self.ready.read().await {
            Ok(())
        } else {
            Err(RetrieverError::BinaryNotFound {
                path: PathBuf::from("bin/yt-dlp"),
            })
        }
    }

    async fn fetch_metadata(&self, link: &str) -> Result<MediaMetadata, RetrieverError> {
        self.metadata_lookups.write().await.push(link.to_string());
        self.metadata
            .read()
            .await
            .clone()
            .ok_or_else(|| RetrieverError::metadata("mock metadata unavailable"))
    }

    async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalOutcome, RetrieverError> {
        self.requests.write().await.push(request.clone());

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        let script = self.script.read().await.clone();
        if !script.duration.is_zero() {
            tokio::time::sleep(script.duration).await;
        }

        let path = request.output_dir.join(&script.file_name);
        if script.write_file {
            tokio::fs::write(&path, &script.contents).await?;
        }

        Ok(RetrievalOutcome {
            success: script.exit_code == 0,
            exit_code: Some(script.exit_code),
            declared_path: script.declare_path.then_some(path),
            diagnostics: script.diagnostics,
            duration_ms: script.duration.as_millis() as u64,
        })
    }
}
