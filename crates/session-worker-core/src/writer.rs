//! Result writer: persists a [`ResultDocument`] with write-temp-then-rename semantics.
//! Readers of the final path see either the previous complete document or the new one.

use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::result::ResultDocument;

/// Suffix appended to the final file name for the staging file.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Error from result writes.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("serialize result for {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WriteError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        WriteError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            WriteError::Io { source, .. } => Some(source.kind()),
            WriteError::Serialize { .. } => None,
        }
    }
}

/// Result writer abstraction. The store writes every document through one of these.
pub trait ResultWriter: Send + Sync {
    fn write(&self, path: &Path, document: &ResultDocument) -> Result<(), WriteError>;
}

/// Sibling staging path: `results.json` -> `results.json.tmp`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

/// Default writer: pretty JSON, staged and fsynced next to the target, then renamed over it.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicJsonWriter;

impl AtomicJsonWriter {
    /// Write `body` to the staging file and flush it to disk. Returns the staging path.
    pub(crate) fn stage(&self, path: &Path, body: &str) -> Result<PathBuf, WriteError> {
        let tmp = temp_path_for(path);
        let mut file = File::create(&tmp).map_err(|e| WriteError::io(&tmp, e))?;
        file.write_all(body.as_bytes())
            .map_err(|e| WriteError::io(&tmp, e))?;
        file.sync_all().map_err(|e| WriteError::io(&tmp, e))?;
        Ok(tmp)
    }

    pub(crate) fn commit(&self, tmp: &Path, path: &Path) -> Result<(), WriteError> {
        std::fs::rename(tmp, path).map_err(|e| WriteError::io(path, e))
    }
}

impl ResultWriter for AtomicJsonWriter {
    fn write(&self, path: &Path, document: &ResultDocument) -> Result<(), WriteError> {
        let body = serde_json::to_string_pretty(document).map_err(|e| WriteError::Serialize {
            path: path.to_path_buf(),
            source: e,
        })?;
        let tmp = self.stage(path, &body)?;
        self.commit(&tmp, path)?;
        tracing::debug!(
            event = "result.written",
            domain = "store",
            path = %path.display(),
            status = ?document.status,
            bytes = body.len() as u64
        );
        Ok(())
    }
}
