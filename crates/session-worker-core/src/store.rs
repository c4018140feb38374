//! Session store: the filesystem as system of record, behind [`SessionStore`].
//! [`FsSessionStore`] lists immediate subdirectories of the sessions root.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::result::ResultDocument;
use crate::session::{Session, SessionState};
use crate::writer::{AtomicJsonWriter, ResultWriter, WriteError};

/// Error from session store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sessions root not found: {}", .0.display())]
    RootMissing(PathBuf),
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl StoreError {
    pub fn is_permission_denied(&self) -> bool {
        match self {
            StoreError::Io { source, .. } => source.kind() == ErrorKind::PermissionDenied,
            StoreError::Write(w) => w.io_kind() == Some(ErrorKind::PermissionDenied),
            StoreError::RootMissing(_) => false,
        }
    }
}

/// Access to sessions and their artifacts.
pub trait SessionStore: Send + Sync {
    /// Every session under the root with its current state, in iteration order.
    fn inspect(&self) -> Result<Vec<Session>, StoreError>;

    /// Sessions eligible for a run, in iteration order. Index 0 is the next to process.
    fn scan(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self
            .inspect()?
            .into_iter()
            .filter(Session::is_eligible)
            .collect())
    }

    /// Current size of the session's recording, `None` when it is absent.
    fn video_size(&self, session: &Session) -> Result<Option<u64>, StoreError>;

    /// Persist the result document. The only write path for `results.json`.
    fn write_result(&self, session: &Session, document: &ResultDocument) -> Result<(), StoreError>;
}

pub struct FsSessionStore {
    root: PathBuf,
    writer: Arc<dyn ResultWriter>,
}

impl FsSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_writer(root, Arc::new(AtomicJsonWriter))
    }

    pub fn with_writer(root: impl Into<PathBuf>, writer: Arc<dyn ResultWriter>) -> Self {
        Self {
            root: root.into(),
            writer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn inspect_entry(&self, path: &Path) -> Option<Session> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| log_entry_fault(path, &e))
            .ok()?;
        if !metadata.is_dir() {
            return None;
        }
        let present = |name: &str| {
            let file = path.join(name);
            file.try_exists().map_err(|e| log_entry_fault(&file, &e))
        };
        let has_video = present(crate::session::VIDEO_FILE).ok()?;
        let has_result = present(crate::session::RESULT_FILE).ok()?;
        Some(Session::new(
            path,
            SessionState::from_presence(has_video, has_result),
        ))
    }
}

/// Per-entry faults skip the entry; the scan goes on.
fn log_entry_fault(path: &Path, e: &std::io::Error) {
    if e.kind() == ErrorKind::PermissionDenied {
        warn!(
            event = "scan.permission_denied",
            domain = "store",
            path = %path.display(),
            error = %e
        );
    } else {
        warn!(
            event = "scan.entry_failed",
            domain = "store",
            path = %path.display(),
            error = %e
        );
    }
}

impl SessionStore for FsSessionStore {
    fn inspect(&self) -> Result<Vec<Session>, StoreError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::RootMissing(self.root.clone()),
            _ => StoreError::Io {
                path: self.root.clone(),
                source: e,
            },
        })?;
        let mut sessions = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(
                        event = "scan.entry_failed",
                        domain = "store",
                        path = %self.root.display(),
                        error = %e
                    );
                    continue;
                }
            };
            let path = entry.path();
            if let Some(session) = self.inspect_entry(&path) {
                sessions.push(session);
            }
        }
        debug!(
            event = "scan.inspected",
            domain = "store",
            root = %self.root.display(),
            sessions = sessions.len() as u64
        );
        Ok(sessions)
    }

    fn video_size(&self, session: &Session) -> Result<Option<u64>, StoreError> {
        let path = session.video_path();
        match std::fs::metadata(&path) {
            Ok(m) => Ok(Some(m.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io { path, source: e }),
        }
    }

    fn write_result(&self, session: &Session, document: &ResultDocument) -> Result<(), StoreError> {
        self.writer.write(&session.result_path(), document)?;
        Ok(())
    }
}
