//! Result document persisted once per session as `results.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status carried by a [`ResultDocument`]. `Starting` only exists in memory while a run is
/// being assembled; it reaches disk only if the process dies before the final write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Starting,
    Ok,
    Error,
}

/// Throughput and latency figures reported by the benchmark tool. Missing labels stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub fps_hw_only: Option<f64>,
    pub fps_streaming: Option<f64>,
    pub latency_ms: Option<f64>,
}

impl Metrics {
    pub fn is_empty(&self) -> bool {
        self.fps_hw_only.is_none() && self.fps_streaming.is_none() && self.latency_ms.is_none()
    }
}

/// Model artifact selected for a run, with its display name (file stem).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReference {
    path: PathBuf,
    name: String,
}

impl ModelReference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The single artifact written per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub status: RunStatus,
    pub session: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    #[serde(default)]
    pub raw_tail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_excerpt: Option<String>,
}

impl ResultDocument {
    /// Document for a run that begins now. `model` is `None` when no model could be resolved.
    pub fn starting(session: impl Into<String>, model: Option<&ModelReference>) -> Self {
        Self {
            status: RunStatus::Starting,
            session: session.into(),
            timestamp: Utc::now(),
            model_path: model.map(|m| m.path().to_string_lossy().into_owned()),
            model_name: model.map(|m| m.name().to_string()),
            duration_seconds: None,
            metrics: None,
            raw_tail: String::new(),
            error: None,
            stderr_excerpt: None,
        }
    }

    pub fn succeed(mut self, metrics: Metrics, raw_tail: impl Into<String>) -> Self {
        self.status = RunStatus::Ok;
        self.metrics = Some(metrics);
        self.raw_tail = raw_tail.into();
        self.error = None;
        self
    }

    pub fn fail(mut self, error: impl Into<String>, raw_tail: impl Into<String>) -> Self {
        self.status = RunStatus::Error;
        self.error = Some(error.into());
        self.raw_tail = raw_tail.into();
        self
    }

    pub fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration_seconds = Some(round_seconds(elapsed));
        self
    }

    pub fn with_stderr_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.stderr_excerpt = Some(excerpt.into());
        self
    }
}

/// Seconds rounded to two decimals.
pub fn round_seconds(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}
