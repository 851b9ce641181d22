//! Delete-after-send cleanup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Removes a delivered artifact, and then its directory if that is left
/// empty, when dropped.
///
/// The guard travels with the response body, so cleanup happens whether the
/// body finishes, errors, or is dropped because the client went away.
#[derive(Debug)]
pub struct CleanupGuard {
    file: PathBuf,
    dir: Option<PathBuf>,
    armed: bool,
}

impl CleanupGuard {
    /// Guards `file`, and `dir` if given.
    pub fn new(file: impl Into<PathBuf>, dir: Option<PathBuf>) -> Self {
        Self {
            file: file.into(),
            dir,
            armed: true,
        }
    }

    /// The guarded file.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Keeps the files on drop.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        match fs::remove_file(&self.file) {
            Ok(()) => debug!("Removed delivered artifact {}", self.file.display()),
            // Someone else already cleaned up; the directory may belong to
            // a newer job by now.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!("Failed to remove {}: {}", self.file.display(), e);
                return;
            }
        }

        if let Some(dir) = &self.dir {
            remove_dir_if_empty(dir);
        }
    }
}

/// Removes `dir` if it has no entries. Failures are only logged.
fn remove_dir_if_empty(dir: &Path) {
    let is_empty = match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => {
            warn!("Failed to list {}: {}", dir.display(), e);
            return;
        }
    };

    if is_empty {
        match fs::remove_dir(dir) {
            Ok(()) => debug!("Removed empty directory {}", dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", dir.display(), e),
        }
    }
}
