//! Execution coordination.
//!
//! The public entry points live here. Both concurrency modes share one
//! resolved pipeline: resolve effective configuration, resolve the
//! interpreter, spawn through the launcher, aggregate output, finalize a
//! result. Synchronous calls block until the result is final; asynchronous
//! calls return a live [`ExecHandle`] immediately and deliver the result
//! through [`ExecHandle::wait`] and/or a completion callback invoked
//! exactly once.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, error};

use super::aggregator::{mirror_for, spawn_reader, AggregatorState};
use super::launcher;
use super::result::{ExecOutput, ExecResult, OutputChunk, OutputSource, INTERNAL_FAILURE_CODE};
use crate::config::{Encoding, ExecConfig, ExecOptions};
use crate::context::ExecContext;
use crate::error::{ExecError, Result};

/// Diagnostic reported when no command shell can be resolved.
pub const INTERPRETER_ERROR: &str =
    "Unable to find a path to the interpreter. Please manually configure it.";

/// Poll interval of the child wait loop.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Capacity of the chunk channel backing a live handle.
const CHUNK_CHANNEL_CAPACITY: usize = 64;

type Callback = Box<dyn FnOnce(i32, ExecOutput, ExecOutput) + Send>;

impl ExecContext {
    /// Run `command` synchronously with the context defaults.
    ///
    /// Blocks until the child exits, times out, or is torn down for
    /// exceeding the output cap. A non-zero exit is a normal result, not
    /// an `Err`; only a missing command short-circuits.
    pub fn exec(&self, command: &str) -> Result<ExecResult> {
        self.exec_with(command, &ExecOptions::new())
    }

    /// Run `command` synchronously with per-call options overlaid on the
    /// context defaults.
    pub fn exec_with(&self, command: &str, options: &ExecOptions) -> Result<ExecResult> {
        let config = self.begin(command, options)?;
        let result = start(command, &config, None).wait();
        Ok(self.settle(command, &config, result))
    }

    /// Run `command` asynchronously, returning a live handle immediately.
    ///
    /// The handle streams output chunks as they arrive and yields the
    /// final result from [`ExecHandle::wait`]. Must be called within a
    /// tokio runtime.
    pub async fn exec_async(&self, command: &str, options: &ExecOptions) -> Result<ExecHandle> {
        let config = self.begin(command, options)?;
        Ok(self.spawn_invocation(command, config, None))
    }

    /// Run `command` asynchronously, invoking `callback` exactly once with
    /// `(code, stdout, stderr)` after both streams have drained and the
    /// exit status is known. Also returns the live handle.
    pub async fn exec_async_callback<F>(
        &self,
        command: &str,
        options: &ExecOptions,
        callback: F,
    ) -> Result<ExecHandle>
    where
        F: FnOnce(i32, ExecOutput, ExecOutput) + Send + 'static,
    {
        let config = self.begin(command, options)?;
        Ok(self.spawn_invocation(command, config, Some(Box::new(callback))))
    }

    /// Shared invocation preamble: clear the error channel, reject blank
    /// commands, resolve the effective configuration.
    fn begin(&self, command: &str, options: &ExecOptions) -> Result<ExecConfig> {
        self.clear_error();
        if command.trim().is_empty() {
            self.report_error(ExecError::MissingCommand.to_string());
            return Err(ExecError::MissingCommand);
        }
        Ok(options.apply_to(&self.defaults()))
    }

    /// Shared invocation epilogue: fatal escalation and error reporting.
    fn settle(&self, command: &str, config: &ExecConfig, result: ExecResult) -> ExecResult {
        if result.code == 0 {
            return result;
        }

        if config.fatal && !config.fatal_exceptions.contains(&result.code) {
            error!(code = result.code, command, "fatal: command failed");
            eprintln!(
                "shell-exec: fatal error: command `{command}` exited with code {}",
                result.code
            );
            std::process::exit(result.code);
        }

        let stderr_text = result.stderr.as_text();
        let message = if stderr_text.trim().is_empty() {
            format!("exec: command `{command}` exited with code {}", result.code)
        } else {
            stderr_text.trim_end().to_string()
        };
        self.report_error(message);
        result
    }

    fn spawn_invocation(
        &self,
        command: &str,
        config: ExecConfig,
        callback: Option<Callback>,
    ) -> ExecHandle {
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let launch = start(command, &config, Some(tx));
        let pid = launch.pid();

        let ctx = self.clone();
        let command = command.to_string();
        let join = tokio::task::spawn_blocking(move || {
            let result = ctx.settle(&command, &config, launch.wait());
            if let Some(cb) = callback {
                cb(result.code, result.stdout.clone(), result.stderr.clone());
            }
            result
        });

        ExecHandle {
            pid,
            chunks: rx,
            join,
        }
    }
}

/// Run `command` synchronously against the global context.
pub fn exec(command: &str) -> Result<ExecResult> {
    ExecContext::global().exec(command)
}

/// Run `command` synchronously against the global context with options.
pub fn exec_with(command: &str, options: &ExecOptions) -> Result<ExecResult> {
    ExecContext::global().exec_with(command, options)
}

/// A live asynchronous invocation.
///
/// Owned by exactly one caller; never shared across invocations. Dropping
/// the handle detaches the invocation (the child keeps running to
/// completion and fatal/error bookkeeping still happens).
#[derive(Debug)]
pub struct ExecHandle {
    pid: Option<u32>,
    chunks: mpsc::Receiver<OutputChunk>,
    join: tokio::task::JoinHandle<ExecResult>,
}

impl ExecHandle {
    /// OS process id of the spawned child, when one was spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Next output chunk, in arrival order. `None` once both streams have
    /// reached end-of-stream.
    pub async fn next_chunk(&mut self) -> Option<OutputChunk> {
        self.chunks.recv().await
    }

    /// Wait for completion and return the final result.
    ///
    /// Unread chunks are discarded; the buffered result carries the full
    /// captured output regardless.
    pub async fn wait(self) -> Result<ExecResult> {
        let Self { chunks, join, .. } = self;
        drop(chunks);
        join.await.map_err(|e| ExecError::Task(e.to_string()))
    }
}

/// A started invocation: either a child running with its readers attached,
/// or an already-completed failure (interpreter resolution or spawn).
enum Launch {
    Failed(ExecResult),
    Live(Running),
}

struct Running {
    child: std::process::Child,
    stdout_reader: thread::JoinHandle<Vec<u8>>,
    stderr_reader: thread::JoinHandle<Vec<u8>>,
    state: Arc<AggregatorState>,
    deadline: Option<Instant>,
    encoding: Encoding,
}

impl Launch {
    fn pid(&self) -> Option<u32> {
        match self {
            Self::Failed(_) => None,
            Self::Live(running) => Some(running.child.id()),
        }
    }

    fn wait(self) -> ExecResult {
        match self {
            Self::Failed(result) => result,
            Self::Live(running) => running.wait(),
        }
    }
}

/// Resolve the interpreter and spawn the child with the aggregator
/// registered against its pipes before any output can be produced.
fn start(command: &str, config: &ExecConfig, chunks: Option<mpsc::Sender<OutputChunk>>) -> Launch {
    let Some((interpreter, shell_kind)) = launcher::resolve_interpreter(config) else {
        return Launch::Failed(ExecResult::internal_failure(
            INTERPRETER_ERROR,
            config.encoding,
        ));
    };

    debug!(
        command,
        interpreter = %interpreter.display(),
        shell = %shell_kind,
        "spawning command"
    );

    let mut child = match launcher::spawn(
        &interpreter,
        &shell_kind,
        command,
        config.cwd.as_deref(),
        &config.env,
    ) {
        Ok(child) => child,
        Err(e) => {
            return Launch::Failed(ExecResult::internal_failure(
                &format!("exec: failed to launch `{}`: {}", interpreter.display(), e),
                config.encoding,
            ));
        }
    };

    let state = Arc::new(AggregatorState::new(config.max_buffer));

    let stdout_reader = match child.stdout.take() {
        Some(pipe) => spawn_reader(
            pipe,
            OutputSource::Stdout,
            Arc::clone(&state),
            mirror_for(config.silent, OutputSource::Stdout),
            chunks.clone(),
        ),
        None => thread::spawn(Vec::new),
    };
    let stderr_reader = match child.stderr.take() {
        Some(pipe) => spawn_reader(
            pipe,
            OutputSource::Stderr,
            Arc::clone(&state),
            mirror_for(config.silent, OutputSource::Stderr),
            chunks,
        ),
        None => thread::spawn(Vec::new),
    };

    Launch::Live(Running {
        child,
        stdout_reader,
        stderr_reader,
        state,
        deadline: config.timeout().map(|t| Instant::now() + t),
        encoding: config.encoding,
    })
}

impl Running {
    /// Block until the child completes, times out, or overflows the output
    /// cap, then finalize the result. The result is built only after both
    /// readers have reached end-of-stream.
    fn wait(mut self) -> ExecResult {
        let code = loop {
            if self.state.overflowed() {
                debug!(pid = self.child.id(), "output cap exceeded, killing child");
                launcher::kill_tree(&mut self.child);
                break self.reap();
            }

            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(pid = self.child.id(), "timeout expired, killing child");
                launcher::kill_tree(&mut self.child);
                break self.reap();
            }

            match self.child.try_wait() {
                Ok(Some(status)) => break launcher::exit_code(status),
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(_) => {
                    launcher::kill_tree(&mut self.child);
                    break INTERNAL_FAILURE_CODE;
                }
            }
        };

        let stdout_raw = self.stdout_reader.join().unwrap_or_default();
        let mut stderr_raw = self.stderr_reader.join().unwrap_or_default();

        let code = if self.state.overflowed() {
            let diagnostic = format!(
                "shell-exec: maxBuffer length exceeded ({} bytes)\n",
                self.state.max_buffer()
            );
            stderr_raw.extend_from_slice(diagnostic.as_bytes());
            INTERNAL_FAILURE_CODE
        } else {
            code
        };

        debug!(code, "command finished");
        ExecResult::from_raw(code, stdout_raw, stderr_raw, self.encoding)
    }

    fn reap(&mut self) -> i32 {
        self.child
            .wait()
            .map(launcher::exit_code)
            .unwrap_or(INTERNAL_FAILURE_CODE)
    }
}
