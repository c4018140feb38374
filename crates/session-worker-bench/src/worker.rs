//! Polling loop: scan, run the first eligible session, sleep, repeat.
//!
//! One session is awaited to completion before the next scan, so at most one benchmark runs at a
//! time. Scan faults back off per [`PollPolicy::fault_backoff`]; session faults never stop the
//! loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use session_worker_core::{PollPolicy, ResultDocument, Session, SessionStore};

use crate::runner::{BenchmarkRunner, RunOutcome, RunnerError};

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No eligible session.
    Idle,
    /// The runner finished with this outcome.
    Processed(RunOutcome),
    /// The runner returned an error: unreadable recording or failed persist.
    SessionFailed,
    ScanFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub cycles: u64,
    pub processed: u64,
    pub device_busy: u64,
    pub session_failures: u64,
    pub idle: u64,
    pub scan_failures: u64,
}

impl WorkerStats {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Idle => self.idle += 1,
            CycleOutcome::Processed(RunOutcome::DeviceBusy) => self.device_busy += 1,
            CycleOutcome::Processed(_) => self.processed += 1,
            CycleOutcome::SessionFailed => self.session_failures += 1,
            CycleOutcome::ScanFailed => self.scan_failures += 1,
        }
    }
}

pub struct Worker {
    store: Arc<dyn SessionStore>,
    runner: BenchmarkRunner,
    policy: PollPolicy,
    max_cycles: Option<u64>,
}

impl Worker {
    pub fn new(store: Arc<dyn SessionStore>, runner: BenchmarkRunner, policy: PollPolicy) -> Self {
        Self {
            store,
            runner,
            policy,
            max_cycles: None,
        }
    }

    /// Stop after this many cycles. `None` runs until shutdown.
    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// One scan and, when something is eligible, one run on the first session.
    pub async fn cycle(&self) -> CycleOutcome {
        let eligible = match self.store.scan() {
            Ok(sessions) => sessions,
            Err(e) => {
                error!(event = "scan.failed", domain = "worker", error = %e);
                return CycleOutcome::ScanFailed;
            }
        };
        let Some(session) = eligible.into_iter().next() else {
            debug!(event = "scan.idle", domain = "worker");
            return CycleOutcome::Idle;
        };

        info!(event = "session.selected", domain = "worker", session = session.name());
        match self.runner.run(&session).await {
            Ok(outcome) => {
                info!(
                    event = "session.finished",
                    domain = "worker",
                    session = session.name(),
                    wrote_result = outcome.wrote_result(),
                    outcome = ?outcome
                );
                CycleOutcome::Processed(outcome)
            }
            Err(e) => {
                error!(
                    event = "session.failed",
                    domain = "worker",
                    session = session.name(),
                    error = %e
                );
                if e.is_access_denied() {
                    self.write_permission_denied(&session, &e);
                }
                CycleOutcome::SessionFailed
            }
        }
    }

    fn write_permission_denied(&self, session: &Session, err: &RunnerError) {
        let document = ResultDocument::starting(session.name(), None)
            .fail(format!("Permission denied: {err}"), "");
        if let Err(e) = self.store.write_result(session, &document) {
            warn!(
                event = "session.fallback_write_failed",
                domain = "worker",
                session = session.name(),
                error = %e
            );
        }
    }

    fn sleep_after(&self, outcome: &CycleOutcome, consecutive_faults: u32) -> Duration {
        match outcome {
            CycleOutcome::Idle => self.policy.idle_interval(),
            CycleOutcome::Processed(_) | CycleOutcome::SessionFailed => self.policy.busy_delay(),
            CycleOutcome::ScanFailed => self.policy.fault_backoff(consecutive_faults),
        }
    }

    /// Run cycles until `shutdown` resolves or `max_cycles` is reached. A running session is
    /// always finished; shutdown is observed between cycles.
    pub async fn run_until<F>(&self, shutdown: F) -> WorkerStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = WorkerStats::default();
        let mut consecutive_faults: u32 = 0;
        info!(
            event = "worker.started",
            domain = "worker",
            idle_interval_ms = self.policy.idle_interval_ms,
            busy_delay_ms = self.policy.busy_delay_ms,
            max_cycles = ?self.max_cycles
        );

        loop {
            if let Some(max) = self.max_cycles
                && stats.cycles >= max
            {
                break;
            }
            let outcome = self.cycle().await;
            stats.record(&outcome);
            if outcome == CycleOutcome::ScanFailed {
                consecutive_faults = consecutive_faults.saturating_add(1);
            } else {
                consecutive_faults = 0;
            }

            let pause = self.sleep_after(&outcome, consecutive_faults);
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(event = "worker.shutdown", domain = "worker");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!(
            event = "worker.stopped",
            domain = "worker",
            cycles = stats.cycles,
            processed = stats.processed,
            device_busy = stats.device_busy,
            scan_failures = stats.scan_failures
        );
        stats
    }
}
