//! Helpers shared by the external tool runners.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Upper bound on diagnostic text kept from a child process.
pub const MAX_DIAGNOSTIC_BYTES: usize = 8000;

/// Builds a command with piped output that is killed if its handle is dropped.
pub fn tool_command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Returns true when a spawn error means the binary itself is missing.
pub fn is_missing_binary(error: &io::Error, program: &Path) -> bool {
    error.kind() == io::ErrorKind::NotFound || (program.is_absolute() && !program.exists())
}

/// Diagnostic text collected up to a byte limit; later output is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CappedBuffer {
    text: String,
    limit: usize,
    truncated: bool,
}

impl CappedBuffer {
    /// Creates an empty buffer holding at most `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
            truncated: false,
        }
    }

    /// Appends one line (plus newline) if there is room left.
    pub fn push_line(&mut self, line: &str) {
        if self.text.len() >= self.limit {
            self.truncated = true;
            return;
        }
        let room = self.limit - self.text.len();
        if line.len() + 1 <= room {
            self.text.push_str(line);
            self.text.push('\n');
        } else {
            let mut cut = room;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            self.text.push_str(&line[..cut]);
            self.truncated = true;
        }
    }

    /// Whether output was dropped because the limit was reached.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Returns the collected text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consumes the buffer, returning the collected text.
    pub fn into_string(self) -> String {
        self.text
    }
}

/// Reads a child pipe line by line until EOF, keeping at most `limit` bytes.
///
/// The pipe is always drained completely so the child never blocks on a full
/// pipe, even after the limit is reached.
pub async fn drain_capped<R>(reader: R, limit: usize) -> io::Result<CappedBuffer>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut buffer = CappedBuffer::new(limit);
    while let Some(line) = lines.next_line().await? {
        buffer.push_line(&line);
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capped_buffer_keeps_lines_under_limit() {
        let mut buffer = CappedBuffer::new(64);
        buffer.push_line("first");
        buffer.push_line("second");
        assert_eq!(buffer.as_str(), "first\nsecond\n");
        assert!(!buffer.is_truncated());
    }

    #[test]
    fn test_capped_buffer_truncates() {
        let mut buffer = CappedBuffer::new(10);
        buffer.push_line("0123456789abcdef");
        buffer.push_line("more");
        assert_eq!(buffer.as_str().len(), 10);
        assert!(buffer.is_truncated());
    }

    #[test]
    fn test_capped_buffer_respects_char_boundaries() {
        let mut buffer = CappedBuffer::new(3);
        buffer.push_line("aéé");
        assert_eq!(buffer.as_str(), "aé");
    }

    #[tokio::test]
    async fn test_drain_capped_reads_everything() {
        let input: &[u8] = b"line one\nline two\nline three\n";
        let buffer = drain_capped(input, 12).await.unwrap();
        assert_eq!(buffer.as_str(), "line one\nlin");
        assert!(buffer.is_truncated());
    }
}
