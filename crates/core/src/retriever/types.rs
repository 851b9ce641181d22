//! Types for the retriever module.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::transcoder::OutputKind;

/// Stdout marker for the path after post-processing.
pub const AFTER_POSTPROCESS: &str = "after_postprocess";
/// Stdout marker for the path after the final move.
pub const AFTER_MOVE: &str = "after_move";

static SIZE_EXCEEDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(larger than max-filesize|exceeds? (the )?max(imum)?[- ]?file ?size)")
        .expect("valid size pattern")
});

/// One retrieval into a job's scratch directory.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    /// Source link.
    pub link: String,
    /// Selects the format selector.
    pub kind: OutputKind,
    /// Job scratch directory; the tool writes only here.
    pub output_dir: PathBuf,
    /// Byte cap passed to the tool, if any.
    pub max_filesize_bytes: Option<u64>,
}

/// What the retrieval process reported when it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalOutcome {
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Last path announced by a print event.
    pub declared_path: Option<PathBuf>,
    /// Captured stderr, capped.
    pub diagnostics: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl RetrievalOutcome {
    /// Whether the diagnostics say the file was over the byte cap.
    pub fn size_exceeded(&self) -> bool {
        is_size_exceeded(&self.diagnostics)
    }
}

/// Descriptive fields from the tool's JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaMetadata {
    pub id: Option<String>,
    pub title: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub ext: Option<String>,
    pub webpage_url: Option<String>,
}

/// Returns true when `text` contains the tool's size-limit message.
pub fn is_size_exceeded(text: &str) -> bool {
    SIZE_EXCEEDED.is_match(text)
}

/// Extracts the path from a `<stage>:<path>` print event line.
pub fn parse_print_event(line: &str) -> Option<PathBuf> {
    let line = line.trim();
    let path = line
        .strip_prefix(AFTER_POSTPROCESS)
        .or_else(|| line.strip_prefix(AFTER_MOVE))?
        .strip_prefix(':')?
        .trim();

    if path.is_empty() || path == "NA" {
        return None;
    }
    Some(PathBuf::from(path))
}

/// Formats a byte count as a `--max-filesize` value (`100M` for 100 MiB).
pub fn filesize_flag(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    match bytes {
        0 => "0".to_string(),
        b if b % GIB == 0 => format!("{}G", b / GIB),
        b if b % MIB == 0 => format!("{}M", b / MIB),
        b if b % KIB == 0 => format!("{}K", b / KIB),
        b => b.to_string(),
    }
}
