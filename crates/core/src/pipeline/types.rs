//! Types for the job pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::admission::PoolSnapshot;
use crate::delivery::{CleanupGuard, GuardedStream};
use crate::retriever::MediaMetadata;
use crate::transcoder::OutputKind;

/// A job submission as received from the caller. Every field is optional
/// here; validation decides what is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl JobRequest {
    /// Creates a fully populated request.
    pub fn new(link: impl Into<String>, kind: OutputKind, request_id: impl Into<String>) -> Self {
        Self {
            link: Some(link.into()),
            kind: Some(kind.as_str().to_string()),
            request_id: Some(request_id.into()),
        }
    }
}

/// A request that passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub link: String,
    pub kind: OutputKind,
    pub request_id: String,
}

/// One admitted job.
#[derive(Debug, Clone)]
pub struct Job {
    pub request_id: String,
    pub link: String,
    pub kind: OutputKind,
    pub started_at: SystemTime,
    /// Exclusive to this job; removed when the job ends.
    pub scratch_dir: PathBuf,
}

/// How the retrieved file was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The path the tool announced exists.
    Declared,
    /// Newest file modified after the job started (minus the skew).
    FallbackRecent,
    /// Newest file regardless of age.
    FallbackNewest,
}

/// The retrieval stage's output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutput {
    pub path: PathBuf,
    pub resolution: Resolution,
}

/// Snapshots of both pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolsSnapshot {
    pub retrieval: PoolSnapshot,
    pub transcode: PoolSnapshot,
}

/// A finished job's artifact, ready to stream.
///
/// The artifact and its scratch directory are deleted once the body built by
/// [`Delivery::into_stream`] is done, or when the delivery is dropped unsent.
#[derive(Debug)]
pub struct Delivery {
    pub request_id: String,
    pub kind: OutputKind,
    pub path: PathBuf,
    pub content_type: &'static str,
    /// Suggested download name.
    pub filename: String,
    pub size_bytes: u64,
    /// Jobs running or queued ahead of this one when it was submitted.
    pub queue_ahead: usize,
    /// Retrieval pool capacity.
    pub pool_limit: usize,
    pub scratch_dir: PathBuf,
    pub metadata: Option<MediaMetadata>,
    cleanup: CleanupGuard,
}

impl Delivery {
    pub(crate) fn new(
        job: &Job,
        path: PathBuf,
        size_bytes: u64,
        queue_ahead: usize,
        pool_limit: usize,
        metadata: Option<MediaMetadata>,
    ) -> Self {
        let filename = delivery_filename(metadata.as_ref(), &path, job.kind);
        let cleanup = CleanupGuard::new(path.clone(), Some(job.scratch_dir.clone()));
        Self {
            request_id: job.request_id.clone(),
            kind: job.kind,
            content_type: job.kind.content_type(),
            path,
            filename,
            size_bytes,
            queue_ahead,
            pool_limit,
            scratch_dir: job.scratch_dir.clone(),
            metadata,
            cleanup,
        }
    }

    /// Hands the artifact's cleanup over to `body`, the stream sending its
    /// bytes.
    pub fn into_stream<S>(self, body: S) -> GuardedStream<S> {
        GuardedStream::new(body, self.cleanup)
    }
}

/// Builds the download name: the media title when known, else the file name.
fn delivery_filename(metadata: Option<&MediaMetadata>, path: &Path, kind: OutputKind) -> String {
    let title = metadata
        .and_then(|m| m.title.as_deref())
        .map(sanitize_filename)
        .filter(|t| !t.is_empty());

    match title {
        Some(title) => format!("{}.{}", title, kind.extension()),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("download.{}", kind.extension())),
    }
}

/// Keeps a title usable inside a quoted `Content-Disposition` filename.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | '"' | ':' | '*' | '?' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    cleaned.trim().trim_matches('.').trim().chars().take(150).collect()
}
