//! Cross-process guard so only one worker drives the accelerator per sessions root.
//!
//! The guard is an exclusive OS lock on `<root>/.worker.lock`, held through the open file for
//! the life of the process. The kernel drops it when the holder exits for any reason, so a file
//! left behind by a killed worker never blocks the next start. The file itself is never removed.

use std::fs::{File, TryLockError};
use std::io::{Seek as _, SeekFrom, Write as _};
use std::path::{Path, PathBuf};

use chrono::Utc;

/// Lock file in the sessions root. A regular file, so the scanner never treats it as a session.
pub const LOCK_FILE: &str = ".worker.lock";

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another worker holds {}", .0.display())]
    Held(PathBuf),
    #[error("lock {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Held for the life of the worker; dropping it releases the OS lock.
#[derive(Debug)]
pub struct WorkerLock {
    path: PathBuf,
    _file: File,
}

impl WorkerLock {
    pub fn acquire(root: &Path) -> Result<Self, LockError> {
        let path = root.join(LOCK_FILE);
        let io_err = |source: std::io::Error| LockError::Io {
            path: root.join(LOCK_FILE),
            source,
        };
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;
        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(LockError::Held(path)),
            Err(TryLockError::Error(e)) => return Err(io_err(e)),
        }

        // Owner details are informational; the OS lock is what excludes.
        let payload = serde_json::json!({
            "pid": std::process::id(),
            "acquired_at": Utc::now().to_rfc3339(),
        });
        let _ = file
            .set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| writeln!(file, "{payload}"))
            .and_then(|_| file.sync_all());
        tracing::debug!(event = "lock.acquired", domain = "worker", path = %path.display());
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
