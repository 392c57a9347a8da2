//! Execution result types.

use std::borrow::Cow;
use std::fmt;

use crate::config::Encoding;

/// Exit code reported for internal failures: interpreter resolution, spawn
/// failure, and output-cap overflow. Distinct from a clean exit (0) but
/// indistinguishable from a child that itself exits 1, matching the
/// process-API convention this models.
pub const INTERNAL_FAILURE_CODE: i32 = 1;

/// Captured output from one stream, represented per the configured encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutput {
    /// Text decoded from the raw bytes (lossy UTF-8).
    Utf8(String),
    /// The untouched byte sequence.
    Bytes(Vec<u8>),
}

impl ExecOutput {
    pub(crate) fn from_raw(raw: Vec<u8>, encoding: Encoding) -> Self {
        match encoding {
            Encoding::Utf8 => Self::Utf8(String::from_utf8_lossy(&raw).into_owned()),
            Encoding::Bytes => Self::Bytes(raw),
        }
    }

    /// The output as text. Byte output is decoded lossily on demand.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Utf8(s) => Cow::Borrowed(s.as_str()),
            Self::Bytes(b) => String::from_utf8_lossy(b),
        }
    }

    /// The output as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Utf8(s) => s.as_bytes(),
            Self::Bytes(b) => b.as_slice(),
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether no output was captured.
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Final result of one command invocation.
///
/// Assembled exactly once per invocation, after both output streams have
/// reached end-of-stream and the exit status is known. A non-zero `code` is
/// a normal, fully-populated value, never an error.
///
/// For compatibility with callers that treat command output as plain text,
/// the result's textual identity equals its stdout: it displays as stdout
/// and compares equal to string values matching stdout.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Exit status: 0 on success, the child's own code on failure,
    /// `128 + signal` for signal death, [`INTERNAL_FAILURE_CODE`] for
    /// launch/resolution/overflow failures.
    pub code: i32,
    /// Captured standard output.
    pub stdout: ExecOutput,
    /// Captured standard error.
    pub stderr: ExecOutput,
}

impl ExecResult {
    pub(crate) fn from_raw(
        code: i32,
        stdout_raw: Vec<u8>,
        stderr_raw: Vec<u8>,
        encoding: Encoding,
    ) -> Self {
        Self {
            code,
            stdout: ExecOutput::from_raw(stdout_raw, encoding),
            stderr: ExecOutput::from_raw(stderr_raw, encoding),
        }
    }

    /// A completed failure for invocations where no child ever ran
    /// (interpreter resolution or spawn failure). The message lands on
    /// captured stderr.
    pub(crate) fn internal_failure(message: &str, encoding: Encoding) -> Self {
        let mut stderr_raw = message.as_bytes().to_vec();
        stderr_raw.push(b'\n');
        Self::from_raw(INTERNAL_FAILURE_CODE, Vec::new(), stderr_raw, encoding)
    }

    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Check if the command failed (non-zero exit code).
    pub fn failed(&self) -> bool {
        !self.success()
    }

    /// The stdout content as text.
    pub fn text(&self) -> Cow<'_, str> {
        self.stdout.as_text()
    }

    /// The stdout content split into lines.
    pub fn to_vec(&self) -> Vec<String> {
        self.text().lines().map(String::from).collect()
    }
}

impl fmt::Display for ExecResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

impl PartialEq<str> for ExecResult {
    fn eq(&self, other: &str) -> bool {
        self.text() == other
    }
}

impl PartialEq<&str> for ExecResult {
    fn eq(&self, other: &&str) -> bool {
        self.text() == *other
    }
}

impl PartialEq<String> for ExecResult {
    fn eq(&self, other: &String) -> bool {
        self.text() == other.as_str()
    }
}

/// A chunk of output streamed from a live invocation.
#[derive(Debug, Clone)]
pub struct OutputChunk {
    /// Raw bytes as read from the pipe.
    pub raw: Vec<u8>,
    /// Stream the chunk arrived on.
    pub source: OutputSource,
}

/// Source stream of an [`OutputChunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl OutputChunk {
    /// Create a new output chunk.
    pub fn new(raw: Vec<u8>, source: OutputSource) -> Self {
        Self { raw, source }
    }

    /// Best-effort text decoding of the chunk.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }
}
