//! Benchmark side of the session worker: the tool seam and its subprocess implementation, the
//! settle check, the per-session runner and the polling loop.

pub mod runner;
pub mod settle;
pub mod tool;
pub mod worker;

pub use runner::{BenchmarkRunner, RunOutcome, RunnerConfig, RunnerError};
pub use settle::{Settle, settle};
pub use tool::{BenchmarkTool, CommandBenchmarkTool, ToolConfig, ToolError, ToolOutcome, ToolOutput};
pub use worker::{CycleOutcome, Worker, WorkerStats};
