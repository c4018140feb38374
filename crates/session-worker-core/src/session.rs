//! Session: one directory under the sessions root holding a recording and, eventually, a result.

use std::path::{Path, PathBuf};

/// Recording uploaded by the capture side.
pub const VIDEO_FILE: &str = "video.mp4";
/// Result document written by this worker.
pub const RESULT_FILE: &str = "results.json";

/// Lifecycle state derived from file presence, computed once per scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No recording yet.
    Empty,
    /// Recording present, no result: eligible for a run.
    Pending,
    /// Result present. Terminal.
    Completed,
}

impl SessionState {
    pub fn from_presence(has_video: bool, has_result: bool) -> Self {
        match (has_video, has_result) {
            (_, true) => SessionState::Completed,
            (true, false) => SessionState::Pending,
            (false, false) => SessionState::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    name: String,
    dir: PathBuf,
    state: SessionState,
}

impl Session {
    pub fn new(dir: impl Into<PathBuf>, state: SessionState) -> Self {
        let dir = dir.into();
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, dir, state }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_eligible(&self) -> bool {
        self.state == SessionState::Pending
    }

    pub fn video_path(&self) -> PathBuf {
        self.dir.join(VIDEO_FILE)
    }

    pub fn result_path(&self) -> PathBuf {
        self.dir.join(RESULT_FILE)
    }
}
