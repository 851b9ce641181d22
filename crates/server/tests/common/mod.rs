//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! with the mock retriever and transcoder injected, so the full job flow
//! runs without `yt-dlp` or `ffmpeg` installed.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use ytdls_core::{
    testing::{MockRetriever, MockTranscoder},
    Config, JobPipeline, PipelineConfig,
};
use ytdls_server::{api::create_router, state::AppState};

/// Test fixture for API testing with mock tools.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_audio_download() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/download", json!({
///         "link": "https://youtu.be/dQw4w9WgXcQ",
///         "type": "audio",
///         "request_id": "job-1"
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock retriever - control the fetched file
    pub retriever: MockRetriever,
    /// Mock transcoder - control the produced artifact
    pub transcoder: MockTranscoder,
    /// Downloads root
    pub downloads: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    /// Body parsed as JSON, `Null` when empty or not JSON.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }

    /// Header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub retrieval_capacity: usize,
    pub retrieval_queue_depth: usize,
    pub max_file_size_bytes: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            retrieval_capacity: 4,
            retrieval_queue_depth: 10,
            max_file_size_bytes: 100 * 1024 * 1024,
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    /// Create a test fixture with custom pool sizes and limits.
    pub fn with_config(test_config: TestConfig) -> Self {
        let downloads = TempDir::new().expect("Failed to create downloads dir");

        let mut config = Config::default();
        config.retrieval.max_concurrent = test_config.retrieval_capacity;
        config.retrieval.max_queue_depth = test_config.retrieval_queue_depth;
        config.pipeline = PipelineConfig::with_downloads_dir(downloads.path().to_path_buf())
            .with_max_file_size(test_config.max_file_size_bytes);

        let retriever = MockRetriever::new();
        let transcoder = MockTranscoder::new();
        let pipeline = JobPipeline::from_config(
            &config,
            Arc::new(retriever.clone()),
            Arc::new(transcoder.clone()),
        );

        let state = Arc::new(AppState::new(config, pipeline));
        let router = create_router(state);

        Self {
            router,
            retriever,
            transcoder,
            downloads,
        }
    }

    /// Path of a request's scratch directory.
    pub fn job_dir(&self, request_id: &str) -> PathBuf {
        self.downloads.path().join(request_id)
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(path), Body::empty())
            .await
    }

    /// Send a GET request with a `Range` header.
    pub async fn get_range(&self, path: &str, range: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("GET")
                .uri(path)
                .header("Range", range),
            Body::empty(),
        )
        .await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.post_with_headers(path, body, &[]).await
    }

    /// Send a POST request with JSON body and extra headers.
    pub async fn post_with_headers(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder, Body::from(serde_json::to_vec(&body).unwrap()))
            .await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("Content-Type", "application/json"),
            Body::from(body.to_string()),
        )
        .await
    }

    async fn send(&self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let request = builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            bytes,
        }
    }
}
