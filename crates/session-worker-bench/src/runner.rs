//! Benchmark runner: one session in, at most one result document out.
//!
//! | situation | document | session afterwards |
//! |---|---|---|
//! | no model resolved | `error`, "No model found" | completed |
//! | tool exited 0 | `ok` with metrics and tail | completed |
//! | deadline passed | `error`, "benchmark timeout" | completed |
//! | nonzero exit, busy marker in stderr | none | still pending |
//! | nonzero exit otherwise | `error`, "benchmark failed" | completed |
//! | any other fault | `error`, fault message | completed |
//!
//! A permission fault while reading the recording is returned as [`RunnerError::Access`] with
//! nothing written; the caller decides whether to record it.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{Instrument as _, error, info, info_span, warn};
use uuid::Uuid;

use session_worker_core::parser::{
    FAILURE_TAIL_LINES, STDERR_EXCERPT_CHARS, SUCCESS_TAIL_LINES, clean_tail, excerpt,
    parse_metrics, strip_ansi,
};
use session_worker_core::result::round_seconds;
use session_worker_core::{
    ModelLocator, ModelReference, ResultDocument, RunStatus, Session, SessionStore, StoreError,
};

use crate::settle::{Settle, settle};
use crate::tool::{BenchmarkTool, ToolError, ToolOutcome, ToolOutput};

pub const NO_MODEL_ERROR: &str = "No model found";
pub const TIMEOUT_ERROR: &str = "benchmark timeout";
pub const TOOL_FAILED_ERROR: &str = "benchmark failed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Interval of the settle check on the recording.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Stderr text that marks the accelerator as held by another process.
    #[serde(default = "default_busy_marker")]
    pub busy_marker: String,
}

const fn default_settle_ms() -> u64 {
    1_000
}

fn default_busy_marker() -> String {
    "HAILO_OUT_OF_PHYSICAL_DEVICES".to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            busy_marker: default_busy_marker(),
        }
    }
}

impl RunnerConfig {
    pub fn with_settle_ms(mut self, settle_ms: u64) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// What a run did with the session.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// `ok` document written.
    Completed { duration_seconds: f64 },
    /// `error` document written.
    Failed { reason: String },
    /// Device contention: nothing written, session stays eligible.
    DeviceBusy,
}

impl RunOutcome {
    pub fn wrote_result(&self) -> bool {
        !matches!(self, RunOutcome::DeviceBusy)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("read recording for session {session}: {source}")]
    Access {
        session: String,
        #[source]
        source: StoreError,
    },
    #[error("persist result for session {session}: {source}")]
    Persist {
        session: String,
        #[source]
        source: StoreError,
    },
}

impl RunnerError {
    /// The recording could not be read for lack of permission. The result path may still be
    /// writable.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, RunnerError::Access { .. })
    }
}

#[derive(Debug, thiserror::Error)]
enum RunFault {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

pub struct BenchmarkRunner {
    store: Arc<dyn SessionStore>,
    locator: Arc<dyn ModelLocator>,
    tool: Arc<dyn BenchmarkTool>,
    config: RunnerConfig,
}

impl BenchmarkRunner {
    pub fn new(
        store: Arc<dyn SessionStore>,
        locator: Arc<dyn ModelLocator>,
        tool: Arc<dyn BenchmarkTool>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            store,
            locator,
            tool,
            config,
        }
    }

    pub async fn run(&self, session: &Session) -> Result<RunOutcome, RunnerError> {
        let span = info_span!("session_run", run_id = %Uuid::new_v4(), session = session.name());
        self.run_inner(session).instrument(span).await
    }

    async fn run_inner(&self, session: &Session) -> Result<RunOutcome, RunnerError> {
        let Some(model) = self.locator.locate() else {
            error!(event = "session.no_model", domain = "bench");
            let document = ResultDocument::starting(session.name(), None).fail(NO_MODEL_ERROR, "");
            self.persist(session, &document)?;
            return Ok(RunOutcome::Failed {
                reason: NO_MODEL_ERROR.to_string(),
            });
        };
        let document = ResultDocument::starting(session.name(), Some(&model));

        let finished = match self.benchmark(session, &model, document.clone()).await {
            Ok(Some(finished)) => finished,
            Ok(None) => return Ok(RunOutcome::DeviceBusy),
            Err(RunFault::Store(source)) if source.is_permission_denied() => {
                return Err(RunnerError::Access {
                    session: session.name().to_string(),
                    source,
                });
            }
            Err(fault) => {
                error!(event = "session.run_fault", domain = "bench", error = %fault);
                document.fail(fault.to_string(), "")
            }
        };
        self.persist(session, &finished)?;

        let outcome = match finished.status {
            RunStatus::Ok => RunOutcome::Completed {
                duration_seconds: finished.duration_seconds.unwrap_or_default(),
            },
            _ => RunOutcome::Failed {
                reason: finished.error.clone().unwrap_or_default(),
            },
        };
        Ok(outcome)
    }

    /// Settle, run the tool and turn its outcome into a document. `None` means device busy.
    async fn benchmark(
        &self,
        session: &Session,
        model: &ModelReference,
        document: ResultDocument,
    ) -> Result<Option<ResultDocument>, RunFault> {
        match settle(self.store.as_ref(), session, self.config.settle_interval()).await? {
            Settle::Missing => warn!(
                event = "session.video_missing",
                domain = "bench",
                "recording disappeared during the settle check"
            ),
            Settle::Grew => info!(event = "session.video_grew", domain = "bench"),
            Settle::Stable => {}
        }

        info!(
            event = "session.run_started",
            domain = "bench",
            model = model.name(),
            model_path = %model.path().display()
        );
        let outcome = self.tool.run(model.path()).await?;
        Ok(self.interpret(outcome, document))
    }

    fn interpret(&self, outcome: ToolOutcome, document: ResultDocument) -> Option<ResultDocument> {
        match outcome {
            ToolOutcome::Exited(output) if output.success => {
                let metrics = parse_metrics(&strip_ansi(&output.stdout));
                info!(
                    event = "session.run_completed",
                    domain = "bench",
                    duration_seconds = round_seconds(output.elapsed),
                    fps_hw_only = ?metrics.fps_hw_only,
                    fps_streaming = ?metrics.fps_streaming,
                    latency_ms = ?metrics.latency_ms
                );
                if metrics.is_empty() {
                    warn!(event = "session.metrics_missing", domain = "bench");
                }
                Some(
                    document
                        .succeed(metrics, clean_tail(&output.stdout, SUCCESS_TAIL_LINES))
                        .with_duration(output.elapsed),
                )
            }
            ToolOutcome::TimedOut { elapsed } => {
                warn!(
                    event = "session.run_timeout",
                    domain = "bench",
                    duration_seconds = round_seconds(elapsed)
                );
                let message = format!("Benchmark timed out after {:.2}s", elapsed.as_secs_f64());
                Some(document.fail(TIMEOUT_ERROR, message).with_duration(elapsed))
            }
            ToolOutcome::Exited(output) => self.interpret_failure(output, document),
        }
    }

    fn interpret_failure(
        &self,
        output: ToolOutput,
        document: ResultDocument,
    ) -> Option<ResultDocument> {
        let stderr = strip_ansi(&output.stderr);
        if stderr.contains(&self.config.busy_marker) {
            warn!(
                event = "session.device_busy",
                domain = "bench",
                exit_code = ?output.exit_code,
                "accelerator busy, session left pending for a later cycle"
            );
            return None;
        }
        warn!(
            event = "session.run_failed",
            domain = "bench",
            exit_code = ?output.exit_code,
            stderr_len = stderr.len() as u64
        );
        Some(
            document
                .fail(
                    TOOL_FAILED_ERROR,
                    clean_tail(&output.stdout, FAILURE_TAIL_LINES),
                )
                .with_stderr_excerpt(excerpt(&stderr, STDERR_EXCERPT_CHARS))
                .with_duration(output.elapsed),
        )
    }

    fn persist(&self, session: &Session, document: &ResultDocument) -> Result<(), RunnerError> {
        self.store
            .write_result(session, document)
            .map_err(|source| RunnerError::Persist {
                session: session.name().to_string(),
                source,
            })
    }
}
