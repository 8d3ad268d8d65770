//! Advisory single-writer lock on a torrent directory.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Lock file created inside the torrent directory.
pub const LOCK_FILE_NAME: &str = ".refresher.lock";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another run holds {path} (remove it if that run is gone)")]
    Held { path: PathBuf },

    #[error("failed to create lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held for the duration of a run; the lock file is removed on drop.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
}

impl DirLock {
    /// Create the lock file exclusively and write our PID into it.
    pub fn acquire(dir: &Path) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILE_NAME);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(LockError::Held { path })
            }
            Err(source) => return Err(LockError::Io { path, source }),
        };

        let lock = Self { path };
        writeln!(file, "{}", std::process::id()).map_err(|source| LockError::Io {
            path: lock.path.clone(),
            source,
        })?;
        debug!(path = %lock.path.display(), "Acquired directory lock");
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
        }
    }
}
