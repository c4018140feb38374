//! Benchmark tool: runs the external benchmark executable against a model with a hard timeout.
//! The runner depends on [`BenchmarkTool`]; [`CommandBenchmarkTool`] spawns the real process.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

/// Captured result of a tool process that ran to exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Exited(ToolOutput),
    /// Deadline passed; the process was killed.
    TimedOut { elapsed: Duration },
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Benchmark tool abstraction. Implement and pass to the runner.
#[async_trait]
pub trait BenchmarkTool: Send + Sync {
    async fn run(&self, model: &Path) -> Result<ToolOutcome, ToolError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the duration flag and the model path.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default = "default_duration_flag")]
    pub duration_flag: String,
    #[serde(default = "default_bench_seconds")]
    pub bench_seconds: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_program() -> String {
    "hailortcli".to_string()
}

fn default_args() -> Vec<String> {
    vec!["benchmark".to_string()]
}

fn default_duration_flag() -> String {
    "-t".to_string()
}

const fn default_bench_seconds() -> u64 {
    3
}

const fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            duration_flag: default_duration_flag(),
            bench_seconds: default_bench_seconds(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ToolConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_bench_seconds(mut self, bench_seconds: u64) -> Self {
        self.bench_seconds = bench_seconds;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Full argument list for one run: `args.. <duration_flag> <seconds> <model>`.
    pub fn command_args(&self, model: &Path) -> Vec<String> {
        let mut out = self.args.clone();
        out.push(self.duration_flag.clone());
        out.push(self.bench_seconds.to_string());
        out.push(model.to_string_lossy().into_owned());
        out
    }
}

/// Spawns the configured program. Output is captured in full; the child is killed when the
/// timeout elapses.
pub struct CommandBenchmarkTool {
    config: ToolConfig,
}

impl CommandBenchmarkTool {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BenchmarkTool for CommandBenchmarkTool {
    async fn run(&self, model: &Path) -> Result<ToolOutcome, ToolError> {
        let program = self.config.program.clone();
        let args = self.config.command_args(model);
        debug!(
            event = "tool.spawn",
            domain = "bench",
            program = %program,
            args = ?args,
            timeout_ms = self.config.timeout_ms
        );
        let started = Instant::now();
        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(self.config.timeout(), child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ToolOutcome::Exited(ToolOutput {
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                elapsed: started.elapsed(),
            })),
            Ok(Err(e)) => Err(ToolError::Wait { program, source: e }),
            Err(_) => Ok(ToolOutcome::TimedOut {
                elapsed: started.elapsed(),
            }),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolConfig {
        ToolConfig::new("sh", vec!["-c".into(), script.into(), "sh".into()])
    }

    #[test]
    fn default_command_line() {
        let args = ToolConfig::default().command_args(Path::new("/m/yolov8s.hef"));
        assert_eq!(args, vec!["benchmark", "-t", "3", "/m/yolov8s.hef"]);
        assert_eq!(ToolConfig::default().program, "hailortcli");
        assert_eq!(ToolConfig::default().timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn captures_stdout_stderr_and_exit() {
        let tool = CommandBenchmarkTool::new(sh("echo \"model=$3\"; echo oops >&2; exit 3"));
        let outcome = tool.run(Path::new("/m/net.hef")).await.unwrap();
        match outcome {
            ToolOutcome::Exited(out) => {
                assert!(!out.success);
                assert_eq!(out.exit_code, Some(3));
                assert_eq!(out.stdout.trim(), "model=/m/net.hef");
                assert_eq!(out.stderr.trim(), "oops");
            }
            other => panic!("expected Exited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_exit() {
        let tool = CommandBenchmarkTool::new(sh("echo 'FPS (hw_only) = 1.0'"));
        match tool.run(Path::new("m.hef")).await.unwrap() {
            ToolOutcome::Exited(out) => assert!(out.success),
            other => panic!("expected Exited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn times_out_and_reports_elapsed() {
        let tool = CommandBenchmarkTool::new(sh("sleep 5").with_timeout_ms(200));
        let started = Instant::now();
        match tool.run(Path::new("m.hef")).await.unwrap() {
            ToolOutcome::TimedOut { elapsed } => {
                assert!(elapsed >= Duration::from_millis(200));
                assert!(elapsed < Duration::from_secs(4));
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let tool = CommandBenchmarkTool::new(ToolConfig::new("definitely-not-a-benchmark-tool", vec![]));
        let err = tool.run(Path::new("m.hef")).await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
        assert!(err.to_string().contains("failed to start"));
    }
}
