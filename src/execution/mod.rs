//! Command execution engine.
//!
//! This module provides the execution pipeline:
//! - Synchronous and asynchronous execution behind one resolved pipeline
//! - Per-stream output capture with caps and mirroring
//! - Timeout handling with process-group teardown
//!
//! # Example
//!
//! ```no_run
//! use shell_exec::{exec, exec_with, ExecOptions};
//! use std::time::Duration;
//!
//! // Simple one-shot execution
//! let result = exec("echo hello").unwrap();
//! println!("output: {}", result);
//!
//! // With per-call options
//! let result = exec_with(
//!     "cargo build",
//!     &ExecOptions::new()
//!         .silent(true)
//!         .timeout(Duration::from_secs(60)),
//! )
//! .unwrap();
//! assert_eq!(result.code, 0);
//! ```

mod aggregator;
mod coordinator;
mod launcher;
mod result;

pub use coordinator::{exec, exec_with, ExecHandle, INTERPRETER_ERROR};
pub use result::{ExecOutput, ExecResult, OutputChunk, OutputSource, INTERNAL_FAILURE_CODE};
