//! Session benchmark worker binary.

mod config;

use std::sync::Arc;

use anyhow::{Context as _, bail};
use clap::Parser as _;
use tracing::{info, warn};

use session_worker_bench::{BenchmarkRunner, CommandBenchmarkTool, Worker};
use session_worker_core::{FsModelLocator, FsSessionStore, SessionStore, WorkerLock, init_observability};

use crate::config::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    init_observability();
    let args = Args::parse();
    run(args, shutdown_signal()).await
}

/// Resolves on Ctrl-C, or on SIGTERM from a supervisor.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(event = "worker.signal_unavailable", domain = "worker", signal = "interrupt", error = %e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(event = "worker.signal_unavailable", domain = "worker", signal = "terminate", error = %e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!(event = "worker.signal", domain = "worker", signal = "interrupt"),
        _ = terminate => info!(event = "worker.signal", domain = "worker", signal = "terminate"),
    }
}

async fn run(args: Args, shutdown: impl std::future::Future<Output = ()>) -> anyhow::Result<()> {
    let root = args.sessions_dir.clone();
    if !root.is_dir() {
        bail!("missing sessions directory {}", root.display());
    }
    let _lock = if args.no_lock {
        warn!(event = "lock.disabled", domain = "worker");
        None
    } else {
        Some(WorkerLock::acquire(&root).context("acquire worker lock")?)
    };

    let fs_store = FsSessionStore::new(&root);
    info!(
        event = "worker.config",
        domain = "worker",
        pid = std::process::id(),
        sessions_dir = %fs_store.root().display(),
        tool = %args.tool,
        hef_override = ?args.hef_path,
        timeout_secs = args.timeout_secs
    );

    let store: Arc<dyn SessionStore> = Arc::new(fs_store);
    let runner = BenchmarkRunner::new(
        store.clone(),
        Arc::new(FsModelLocator::new(args.locator_config())),
        Arc::new(CommandBenchmarkTool::new(args.tool_config())),
        args.runner_config(),
    );
    let worker = Worker::new(store, runner, args.poll_policy()).with_max_cycles(args.max_cycles);

    let stats = worker.run_until(shutdown).await;
    info!(
        event = "worker.exit",
        domain = "worker",
        cycles = stats.cycles,
        processed = stats.processed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;
    use session_worker_core::lock::LOCK_FILE;

    fn args_for(root: &std::path::Path, extra: &[&str]) -> Args {
        let root = root.to_string_lossy().into_owned();
        let mut argv = vec![
            "session-worker",
            "--sessions-dir",
            root.as_str(),
            "--tool",
            "hailortcli",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn missing_sessions_dir_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let args = args_for(&dir.path().join("absent"), &["--max-cycles", "0"]);
        let err = run(args, std::future::pending()).await.unwrap_err();
        assert!(err.to_string().contains("missing sessions directory"));
    }

    #[tokio::test]
    async fn held_lock_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let _held = WorkerLock::acquire(dir.path()).unwrap();
        let args = args_for(dir.path(), &["--max-cycles", "0"]);
        let err = run(args, std::future::pending()).await.unwrap_err();
        assert!(format!("{err:#}").contains("another worker holds"));
    }

    #[tokio::test]
    async fn lock_is_released_on_exit() {
        let dir = tempfile::tempdir().unwrap();
        let args = args_for(dir.path(), &["--max-cycles", "0"]);
        run(args, std::future::pending()).await.unwrap();
        assert!(dir.path().join(LOCK_FILE).exists());
        WorkerLock::acquire(dir.path()).unwrap();
    }

    #[tokio::test]
    async fn stale_lock_file_does_not_block_restart() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOCK_FILE), "{\"pid\":1}").unwrap();
        let args = args_for(dir.path(), &["--max-cycles", "0"]);
        run(args, std::future::pending()).await.unwrap();
    }

    #[tokio::test]
    async fn no_lock_runs_beside_a_holder() {
        let dir = tempfile::tempdir().unwrap();
        let _held = WorkerLock::acquire(dir.path()).unwrap();
        let args = args_for(dir.path(), &["--max-cycles", "0", "--no-lock"]);
        run(args, std::future::pending()).await.unwrap();
    }
}
