//! Finds the file the retrieval stage actually produced.

use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::debug;

use super::error::PipelineError;
use super::types::{Resolution, ResolvedOutput};

/// Extensions of in-progress download artifacts, never deliverable.
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl"];

/// Picks the job's output file.
///
/// The declared path wins when it exists. Otherwise the scratch directory's
/// regular files are ranked by modification time: the newest one modified at
/// or after `started_at - skew` is taken, else the newest one of any age.
pub async fn resolve_output(
    dir: &Path,
    declared: Option<&Path>,
    started_at: SystemTime,
    skew: Duration,
) -> Result<ResolvedOutput, PipelineError> {
    if let Some(declared) = declared {
        match tokio::fs::metadata(declared).await {
            Ok(meta) if meta.is_file() => {
                return Ok(ResolvedOutput {
                    path: declared.to_path_buf(),
                    resolution: Resolution::Declared,
                });
            }
            _ => debug!(
                "Declared output {} is missing, inspecting {}",
                declared.display(),
                dir.display()
            ),
        }
    }

    let mut candidates = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::OutputNotFound {
                dir: dir.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(PipelineError::Failure(format!(
                "failed to list {}: {}",
                dir.display(),
                e
            )))
        }
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::Failure(format!("failed to list {}: {}", dir.display(), e)))?
    {
        let path = entry.path();
        if is_partial(&path) {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        candidates.push((path, modified));
    }

    candidates.sort_by(|a, b| b.1.cmp(&a.1));

    let threshold = started_at
        .checked_sub(skew)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    if let Some((path, _)) = candidates.iter().find(|(_, modified)| *modified >= threshold) {
        return Ok(ResolvedOutput {
            path: path.clone(),
            resolution: Resolution::FallbackRecent,
        });
    }

    match candidates.into_iter().next() {
        Some((path, _)) => Ok(ResolvedOutput {
            path,
            resolution: Resolution::FallbackNewest,
        }),
        None => Err(PipelineError::OutputNotFound {
            dir: dir.to_path_buf(),
        }),
    }
}

fn is_partial(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PARTIAL_EXTENSIONS.contains(&ext))
}
