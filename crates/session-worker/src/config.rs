//! Command line and environment configuration.

use std::path::{Path, PathBuf};

use clap::Parser;

use session_worker_bench::{RunnerConfig, ToolConfig};
use session_worker_core::{LocatorConfig, PollPolicy};

/// Load `.env` from the crate directory, then from the working directory. Missing files are fine.
pub fn load_dotenv() {
    let _ = dotenvy::from_path(Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/.env")));
    dotenvy::dotenv().ok();
}

/// Benchmarks every new recording session under the sessions root, one at a time.
#[derive(Parser, Debug, Clone)]
#[command(name = "session-worker", version)]
pub struct Args {
    /// Directory whose subdirectories are recording sessions
    #[arg(long, env = "SESSIONS_DIR", default_value = "/home/pi/appdata/sessions")]
    pub sessions_dir: PathBuf,

    /// Model file to benchmark; falls back to the built-in candidates and search when absent
    #[arg(long, env = "HEF_PATH")]
    pub hef_path: Option<PathBuf>,

    /// Benchmark executable
    #[arg(long, env = "BENCH_TOOL", default_value = "hailortcli")]
    pub tool: String,

    /// Benchmark duration passed to the tool
    #[arg(long, default_value_t = 3)]
    pub bench_seconds: u64,

    /// Hard limit for one benchmark run
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,

    /// Sleep when no session is eligible
    #[arg(long, default_value_t = 2_000)]
    pub idle_interval_ms: u64,

    /// Sleep after processing a session
    #[arg(long, default_value_t = 1_000)]
    pub busy_delay_ms: u64,

    /// Upper bound for the retry sleep after repeated scan failures
    #[arg(long, default_value_t = 30_000)]
    pub max_backoff_ms: u64,

    /// Interval of the upload settle check
    #[arg(long, default_value_t = 1_000)]
    pub settle_ms: u64,

    /// Stop after this many cycles
    #[arg(long)]
    pub max_cycles: Option<u64>,

    /// Skip the single-instance lock in the sessions root
    #[arg(long)]
    pub no_lock: bool,
}

impl Args {
    pub fn locator_config(&self) -> LocatorConfig {
        LocatorConfig::default().with_override(self.hef_path.clone())
    }

    pub fn tool_config(&self) -> ToolConfig {
        ToolConfig {
            program: self.tool.clone(),
            ..ToolConfig::default()
        }
        .with_bench_seconds(self.bench_seconds)
        .with_timeout_ms(self.timeout_secs.saturating_mul(1_000))
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::default().with_settle_ms(self.settle_ms)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::default()
            .with_intervals(self.idle_interval_ms, self.busy_delay_ms)
            .with_max_backoff_ms(self.max_backoff_ms)
    }
}
