//! Error types for shell-exec.

use thiserror::Error;

/// Main error type for shell-exec operations.
///
/// Only usage errors surface here: a command that fails, times out, or
/// cannot even be launched still produces a fully-formed
/// [`ExecResult`](crate::ExecResult) with a non-zero code.
#[derive(Error, Debug)]
pub enum ExecError {
    /// No command string was given.
    #[error("exec: must specify command")]
    MissingCommand,

    /// The background execution task failed to complete.
    #[error("execution task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for shell-exec operations.
pub type Result<T> = std::result::Result<T, ExecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_command_display() {
        let err = ExecError::MissingCommand;
        assert!(err.to_string().contains("must specify command"));
    }

    #[test]
    fn test_task_display() {
        let err = ExecError::Task("join failure".into());
        assert!(err.to_string().contains("join failure"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ExecError = io_err.into();
        assert!(matches!(err, ExecError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }
}
