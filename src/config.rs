//! Execution configuration.
//!
//! Defaults are resolved with the following priority (highest to lowest):
//! 1. Per-call [`ExecOptions`]
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Built-in defaults
//!
//! Per-call options overlay only the keys explicitly set on them; unset
//! fields always fall back to the context's defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default cap on captured output per stream (20 MiB).
pub const DEFAULT_MAX_BUFFER: u64 = 20 * 1024 * 1024;

/// How captured output is represented in the final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Decode output into text (lossy UTF-8).
    #[default]
    Utf8,
    /// Preserve the untouched byte sequence.
    Bytes,
}

/// Process-wide execution defaults.
///
/// Every invocation resolves its effective configuration by overlaying a
/// per-call [`ExecOptions`] value on top of one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Explicit path to the command-shell executable. When unset, the
    /// configured `shell` name is resolved against `PATH`.
    pub interpreter_path: Option<PathBuf>,
    /// Shell used to interpret the command (e.g. "bash"). Defaults to a
    /// POSIX `sh` on Unix and `%ComSpec%` on Windows.
    pub shell: Option<String>,
    /// Suppress mirroring of child output to this process's own streams.
    pub silent: bool,
    /// Abort the whole program when a command exits non-zero.
    pub fatal: bool,
    /// Exit codes exempted from fatal escalation.
    pub fatal_exceptions: Vec<i32>,
    /// Working directory for the child. Defaults to the current one.
    pub cwd: Option<PathBuf>,
    /// Maximum captured bytes per stream before the child is torn down.
    pub max_buffer: u64,
    /// Deadline for the child in milliseconds. `None` means no deadline.
    pub timeout_millis: Option<u64>,
    /// Output representation.
    pub encoding: Encoding,
    /// Extra environment variables, applied on top of the inherited ones.
    pub env: HashMap<String, String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            interpreter_path: None,
            shell: None,
            silent: false,
            fatal: false,
            fatal_exceptions: Vec::new(),
            cwd: None,
            max_buffer: DEFAULT_MAX_BUFFER,
            timeout_millis: None,
            encoding: Encoding::Utf8,
            env: HashMap::new(),
        }
    }
}

impl ExecConfig {
    /// Load defaults from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("SHELL_EXEC_SILENT") {
            self.silent = matches!(v.as_str(), "1" | "true" | "yes");
        }

        if let Ok(v) = std::env::var("SHELL_EXEC_FATAL") {
            self.fatal = matches!(v.as_str(), "1" | "true" | "yes");
        }

        if let Ok(v) = std::env::var("SHELL_EXEC_MAX_BUFFER") {
            if let Ok(bytes) = v.parse() {
                self.max_buffer = bytes;
            }
        }

        if let Ok(shell) = std::env::var("SHELL_EXEC_SHELL") {
            if !shell.is_empty() {
                self.shell = Some(shell);
            }
        }

        if let Ok(path) = std::env::var("SHELL_EXEC_INTERPRETER") {
            if !path.is_empty() {
                self.interpreter_path = Some(PathBuf::from(path));
            }
        }
    }

    /// Load defaults with the full priority chain (env > file > built-in).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Effective timeout as a [`Duration`].
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_millis.map(Duration::from_millis)
    }
}

/// Per-call execution options.
///
/// A partial overlay of [`ExecConfig`]: only the fields explicitly set here
/// override the defaults for one invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    interpreter_path: Option<PathBuf>,
    shell: Option<String>,
    silent: Option<bool>,
    fatal: Option<bool>,
    fatal_exceptions: Option<Vec<i32>>,
    cwd: Option<PathBuf>,
    max_buffer: Option<u64>,
    timeout: Option<Duration>,
    encoding: Option<Encoding>,
    env: Option<HashMap<String, String>>,
}

impl ExecOptions {
    /// Create empty options (every field falls back to the defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the command-shell executable path.
    pub fn interpreter_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.interpreter_path = Some(path.into());
        self
    }

    /// Override the shell used to interpret the command.
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    /// Set silent mode for this call.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    /// Set fatal mode for this call.
    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = Some(fatal);
        self
    }

    /// Set the exit codes exempted from fatal escalation.
    pub fn fatal_exceptions(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.fatal_exceptions = Some(codes.into_iter().collect());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Set the per-stream output cap in bytes.
    pub fn max_buffer(mut self, bytes: u64) -> Self {
        self.max_buffer = Some(bytes);
        self
    }

    /// Set the execution deadline.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set the output encoding.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Add multiple environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = self.env.get_or_insert_with(HashMap::new);
        for (k, v) in vars {
            map.insert(k.into(), v.into());
        }
        self
    }

    /// Resolve the effective configuration for one invocation.
    ///
    /// Only fields explicitly set on `self` override `base`.
    pub fn apply_to(&self, base: &ExecConfig) -> ExecConfig {
        let mut cfg = base.clone();
        if let Some(ref path) = self.interpreter_path {
            cfg.interpreter_path = Some(path.clone());
        }
        if let Some(ref shell) = self.shell {
            cfg.shell = Some(shell.clone());
        }
        if let Some(silent) = self.silent {
            cfg.silent = silent;
        }
        if let Some(fatal) = self.fatal {
            cfg.fatal = fatal;
        }
        if let Some(ref codes) = self.fatal_exceptions {
            cfg.fatal_exceptions = codes.clone();
        }
        if let Some(ref dir) = self.cwd {
            cfg.cwd = Some(dir.clone());
        }
        if let Some(bytes) = self.max_buffer {
            cfg.max_buffer = bytes;
        }
        if let Some(timeout) = self.timeout {
            cfg.timeout_millis = Some(timeout.as_millis() as u64);
        }
        if let Some(encoding) = self.encoding {
            cfg.encoding = encoding;
        }
        if let Some(ref env) = self.env {
            cfg.env = env.clone();
        }
        cfg
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading the config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ExecConfig::default();
        assert!(!config.silent);
        assert!(!config.fatal);
        assert!(config.fatal_exceptions.is_empty());
        assert_eq!(config.max_buffer, DEFAULT_MAX_BUFFER);
        assert!(config.timeout_millis.is_none());
        assert_eq!(config.encoding, Encoding::Utf8);
        assert!(config.interpreter_path.is_none());
        assert!(config.shell.is_none());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "silent": true,
            "fatal": true,
            "fatal_exceptions": [2, 3],
            "max_buffer": 1024,
            "timeout_millis": 5000,
            "encoding": "bytes",
            "shell": "bash"
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = ExecConfig::from_file(file.path()).unwrap();
        assert!(config.silent);
        assert!(config.fatal);
        assert_eq!(config.fatal_exceptions, vec![2, 3]);
        assert_eq!(config.max_buffer, 1024);
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.encoding, Encoding::Bytes);
        assert_eq!(config.shell.as_deref(), Some("bash"));
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "silent": true }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = ExecConfig::from_file(file.path()).unwrap();
        assert!(config.silent);
        assert_eq!(config.max_buffer, DEFAULT_MAX_BUFFER); // Default
        assert_eq!(config.encoding, Encoding::Utf8); // Default
    }

    #[test]
    fn test_apply_env_max_buffer() {
        std::env::set_var("SHELL_EXEC_MAX_BUFFER", "4096");
        let mut config = ExecConfig::default();
        config.apply_env();
        assert_eq!(config.max_buffer, 4096);
        std::env::remove_var("SHELL_EXEC_MAX_BUFFER");
    }

    #[test]
    fn test_options_overlay_only_set_keys() {
        let mut base = ExecConfig::default();
        base.silent = true;
        base.max_buffer = 512;

        let options = ExecOptions::new().fatal(true);
        let effective = options.apply_to(&base);

        assert!(effective.fatal); // Overridden
        assert!(effective.silent); // Inherited from base, not reset
        assert_eq!(effective.max_buffer, 512); // Inherited from base
    }

    #[test]
    fn test_options_full_overlay() {
        let base = ExecConfig::default();
        let effective = ExecOptions::new()
            .interpreter_path("/bin/sh")
            .shell("bash")
            .silent(true)
            .fatal(true)
            .fatal_exceptions([4])
            .cwd("/tmp")
            .max_buffer(64)
            .timeout(Duration::from_millis(1500))
            .encoding(Encoding::Bytes)
            .env("KEY", "value")
            .apply_to(&base);

        assert_eq!(effective.interpreter_path, Some(PathBuf::from("/bin/sh")));
        assert_eq!(effective.shell.as_deref(), Some("bash"));
        assert!(effective.silent);
        assert!(effective.fatal);
        assert_eq!(effective.fatal_exceptions, vec![4]);
        assert_eq!(effective.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(effective.max_buffer, 64);
        assert_eq!(effective.timeout_millis, Some(1500));
        assert_eq!(effective.encoding, Encoding::Bytes);
        assert_eq!(effective.env.get("KEY"), Some(&"value".to_string()));
    }

    #[test]
    fn test_options_envs() {
        let vars = [("KEY1", "val1"), ("KEY2", "val2")];
        let effective = ExecOptions::new()
            .envs(vars)
            .apply_to(&ExecConfig::default());

        assert_eq!(effective.env.len(), 2);
        assert_eq!(effective.env.get("KEY1"), Some(&"val1".to_string()));
        assert_eq!(effective.env.get("KEY2"), Some(&"val2".to_string()));
    }

    #[test]
    fn test_config_serialization() {
        let config = ExecConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"max_buffer\""));
        assert!(json.contains("\"encoding\""));
    }
}
