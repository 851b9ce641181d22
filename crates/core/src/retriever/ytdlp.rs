//! yt-dlp based retriever implementation.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use super::config::RetrieverConfig;
use super::error::RetrieverError;
use super::traits::Retriever;
use super::types::{
    filesize_flag, parse_print_event, MediaMetadata, RetrievalOutcome, RetrievalRequest,
    AFTER_MOVE, AFTER_POSTPROCESS,
};
use crate::process::{
    drain_capped, is_missing_binary, tool_command, CappedBuffer, MAX_DIAGNOSTIC_BYTES,
};
use crate::transcoder::OutputKind;

/// Runs the `yt-dlp` binary.
pub struct YtDlpRetriever {
    config: RetrieverConfig,
}

impl YtDlpRetriever {
    /// Creates a new retriever with the given configuration.
    pub fn new(config: RetrieverConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    fn format_selector(&self, kind: OutputKind) -> &str {
        match kind {
            OutputKind::Audio => &self.config.audio_format,
            OutputKind::Video => &self.config.video_format,
        }
    }

    /// Builds the arguments for a retrieval run.
    fn build_retrieve_args(&self, request: &RetrievalRequest) -> Vec<String> {
        let template = request.output_dir.join(&self.config.output_template);

        let mut args = vec![
            "--cookies".to_string(),
            self.config.cookies_path.to_string_lossy().to_string(),
            "-f".to_string(),
            self.format_selector(request.kind).to_string(),
        ];

        if request.kind == OutputKind::Video {
            args.extend([
                "--merge-output-format".to_string(),
                self.config.merge_output_format.clone(),
            ]);
        }

        if let Some(max) = request.max_filesize_bytes {
            args.extend(["--max-filesize".to_string(), filesize_flag(max)]);
        }

        args.extend([
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            // Each event prints "<stage>:<path>" so stdout can be parsed line by line
            "--print".to_string(),
            format!("{0}:{0}:%(filepath)s", AFTER_POSTPROCESS),
            "--print".to_string(),
            format!("{0}:{0}:%(filepath)s", AFTER_MOVE),
            "--no-simulate".to_string(),
            // --print implies --quiet, which would hide the max-filesize notice
            "--no-quiet".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--no-progress".to_string(),
        ]);

        args.extend(self.config.extra_args.iter().cloned());
        args.push("--".to_string());
        args.push(request.link.clone());
        args
    }

    /// Builds the arguments for a metadata lookup.
    fn build_metadata_args(&self, link: &str) -> Vec<String> {
        vec![
            "--cookies".to_string(),
            self.config.cookies_path.to_string_lossy().to_string(),
            "-J".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--".to_string(),
            link.to_string(),
        ]
    }

    fn map_spawn_error(&self, e: io::Error) -> RetrieverError {
        if is_missing_binary(&e, &self.config.binary_path) {
            RetrieverError::BinaryNotFound {
                path: self.config.binary_path.clone(),
            }
        } else {
            RetrieverError::Io(e)
        }
    }
}

/// Stdout messages first, then stderr, so the last line is the tool's
/// final error when there is one.
fn merge_diagnostics(stdout: &str, stderr: &str) -> String {
    let mut merged = CappedBuffer::new(MAX_DIAGNOSTIC_BYTES);
    for line in stdout.lines().chain(stderr.lines()) {
        merged.push_line(line);
    }
    merged.into_string()
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[async_trait]
impl Retriever for YtDlpRetriever {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn ensure_ready(&self) -> Result<(), RetrieverError> {
        if !exists(&self.config.binary_path).await {
            return Err(RetrieverError::BinaryNotFound {
                path: self.config.binary_path.clone(),
            });
        }
        if !exists(&self.config.cookies_path).await {
            return Err(RetrieverError::CookiesNotFound {
                path: self.config.cookies_path.clone(),
            });
        }
        Ok(())
    }

    async fn fetch_metadata(&self, link: &str) -> Result<MediaMetadata, RetrieverError> {
        let output = tool_command(&self.config.binary_path)
            .args(self.build_metadata_args(link))
            .output()
            .await
            .map_err(|e| self.map_spawn_error(e))?;

        if !output.status.success() {
            let mut stderr = CappedBuffer::new(MAX_DIAGNOSTIC_BYTES);
            for line in String::from_utf8_lossy(&output.stderr).lines() {
                stderr.push_line(line);
            }
            return Err(RetrieverError::metadata(format!(
                "exit code {:?}: {}",
                output.status.code(),
                stderr.as_str().trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| RetrieverError::metadata(format!("invalid metadata document: {}", e)))
    }

    async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalOutcome, RetrieverError> {
        let start = Instant::now();
        let args = self.build_retrieve_args(&request);
        debug!("Running {} {:?}", self.config.binary_path.display(), args);

        let mut child = tool_command(&self.config.binary_path)
            .args(&args)
            .spawn()
            .map_err(|e| self.map_spawn_error(e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Print events name the output; every other stdout line is a tool
        // message and joins the diagnostics.
        let read_stdout = async move {
            let mut declared: Option<PathBuf> = None;
            let mut messages = CappedBuffer::new(MAX_DIAGNOSTIC_BYTES);
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Some(line) = lines.next_line().await? {
                    match parse_print_event(&line) {
                        Some(path) => {
                            debug!("Tool declared output {}", path.display());
                            declared = Some(path);
                        }
                        None => messages.push_line(&line),
                    }
                }
            }
            Ok::<_, io::Error>((declared, messages))
        };

        let read_stderr = async move {
            match stderr {
                Some(stderr) => drain_capped(stderr, MAX_DIAGNOSTIC_BYTES).await,
                None => Ok(CappedBuffer::new(MAX_DIAGNOSTIC_BYTES)),
            }
        };

        let (stdout, stderr, status) = tokio::join!(read_stdout, read_stderr, child.wait());

        let status = status?;
        let (declared_path, messages) = stdout.unwrap_or_else(|e| {
            warn!("Failed to read tool output: {}", e);
            (None, CappedBuffer::new(MAX_DIAGNOSTIC_BYTES))
        });
        let stderr = stderr.unwrap_or_else(|e| {
            warn!("Failed to read tool diagnostics: {}", e);
            CappedBuffer::new(MAX_DIAGNOSTIC_BYTES)
        });
        let diagnostics = merge_diagnostics(messages.as_str(), stderr.as_str());

        Ok(RetrievalOutcome {
            success: status.success(),
            exit_code: status.code(),
            declared_path,
            diagnostics,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
