//! Execution context: process-wide defaults and the last-error channel.
//!
//! All entry points hang off an [`ExecContext`]. A shared default instance
//! is available through [`ExecContext::global`] for ergonomic top-level
//! calls; tests construct isolated instances so last-error state never leaks
//! between them.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::config::ExecConfig;

static GLOBAL: OnceLock<ExecContext> = OnceLock::new();

/// Process-wide execution state.
///
/// Holds the mutable execution defaults and the "last error" message
/// written by failing invocations. Cloning is cheap and shares the same
/// underlying state.
#[derive(Debug, Clone)]
pub struct ExecContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    defaults: Mutex<ExecConfig>,
    last_error: Mutex<Option<String>>,
}

impl ExecContext {
    /// Create an isolated context with built-in defaults.
    pub fn new() -> Self {
        Self::with_defaults(ExecConfig::default())
    }

    /// Create an isolated context with the given defaults.
    pub fn with_defaults(defaults: ExecConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                defaults: Mutex::new(defaults),
                last_error: Mutex::new(None),
            }),
        }
    }

    /// The shared process-wide context.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Snapshot of the current defaults.
    pub fn defaults(&self) -> ExecConfig {
        lock(&self.inner.defaults).clone()
    }

    /// Replace the defaults wholesale.
    pub fn set_defaults(&self, defaults: ExecConfig) {
        *lock(&self.inner.defaults) = defaults;
    }

    /// Mutate the defaults in place.
    pub fn update_defaults(&self, f: impl FnOnce(&mut ExecConfig)) {
        f(&mut lock(&self.inner.defaults));
    }

    /// The message recorded by the most recent failing invocation, if any.
    ///
    /// `None` after a succeeding call; `Some` after a failing one. Never
    /// reset automatically between calls other than at invocation start.
    pub fn error(&self) -> Option<String> {
        lock(&self.inner.last_error).clone()
    }

    /// Overwrite the last-error message.
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "recording error");
        *lock(&self.inner.last_error) = Some(message);
    }

    /// Clear the last-error message. Called at the start of each invocation.
    pub(crate) fn clear_error(&self) {
        *lock(&self.inner.last_error) = None;
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}

// A poisoned lock only means a panic mid-update; the state itself is still
// a plain value, so keep going with it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
