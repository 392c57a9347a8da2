//! # shell-exec
//!
//! Unified synchronous/asynchronous shell command execution with captured
//! output.
//!
//! One pipeline runs an arbitrary command string through a system shell and
//! produces a single [`ExecResult`] carrying the exit code and the captured
//! stdout/stderr, whether the child succeeds, fails, times out, overflows
//! the output cap, or cannot be launched at all.
//!
//! ## Features
//!
//! - **Sync and async**: block until completion, or get a live
//!   [`ExecHandle`] immediately with a fire-once completion callback
//! - **Output capture**: per-stream buffers with a configurable cap,
//!   optional mirroring to the parent's own stdout/stderr
//! - **Global-vs-per-call config**: process-wide defaults on an
//!   [`ExecContext`], overlaid per call by [`ExecOptions`]
//! - **String-like results**: an [`ExecResult`] displays and compares as
//!   its stdout text while still exposing `code`/`stdout`/`stderr`
//!
//! ## Quick Start
//!
//! ```no_run
//! use shell_exec::{exec, exec_with, ExecOptions};
//!
//! // Initialize logging
//! shell_exec::logging::try_init().ok();
//!
//! let version = exec("git --version").unwrap();
//! if version.success() {
//!     println!("{}", version);
//! }
//!
//! // Per-call overrides; failures are normal results, not panics
//! let result = exec_with("ls /nonexistent", &ExecOptions::new().silent(true)).unwrap();
//! assert!(result.code > 0);
//! ```
//!
//! Asynchronous execution needs a tokio runtime:
//!
//! ```no_run
//! use shell_exec::{ExecContext, ExecOptions};
//!
//! #[tokio::main]
//! async fn main() -> shell_exec::Result<()> {
//!     let ctx = ExecContext::global();
//!     let mut handle = ctx.exec_async("make -j4", &ExecOptions::new()).await?;
//!
//!     while let Some(chunk) = handle.next_chunk().await {
//!         print!("{}", chunk.text());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod logging;

// Re-export commonly used types
pub use config::{Encoding, ExecConfig, ExecOptions, DEFAULT_MAX_BUFFER};
pub use context::ExecContext;
pub use error::{ExecError, Result};
pub use execution::{
    exec, exec_with, ExecHandle, ExecOutput, ExecResult, OutputChunk, OutputSource,
};
