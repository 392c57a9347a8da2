//! Process launching and teardown.
//!
//! Wraps OS process creation: given a command string and a resolved
//! interpreter, spawns a child with piped stdout/stderr, and tears the
//! child (and on Unix its whole process group) down on timeout or
//! output-cap overflow.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use tracing::warn;

use crate::config::ExecConfig;
use crate::execution::result::INTERNAL_FAILURE_CODE;

/// The shell used when none is configured.
pub(crate) fn default_shell() -> String {
    if cfg!(windows) {
        std::env::var("ComSpec").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        "sh".to_string()
    }
}

/// Resolve the interpreter executable and the shell family name used to
/// build its argument list.
///
/// An explicit `interpreter_path` must point at a runnable file, and its
/// file stem determines the argument family unless a `shell` is also
/// configured; otherwise the configured shell name is resolved against
/// `PATH` (or used directly when it already carries a path). `None` means
/// execution cannot proceed.
pub(crate) fn resolve_interpreter(config: &ExecConfig) -> Option<(PathBuf, String)> {
    if let Some(ref path) = config.interpreter_path {
        if !is_executable(path) {
            return None;
        }
        let kind = match config.shell {
            Some(ref shell) => shell_kind(shell),
            None => shell_kind(&path.to_string_lossy()),
        };
        return Some((path.clone(), kind));
    }

    let shell = config.shell.clone().unwrap_or_else(default_shell);
    let kind = shell_kind(&shell);

    let candidate = Path::new(&shell);
    if candidate.components().count() > 1 {
        return if is_executable(candidate) {
            Some((candidate.to_path_buf(), kind))
        } else {
            None
        };
    }

    find_on_path(&shell).map(|path| (path, kind))
}

/// Spawn the child running `interpreter` with arguments that hand `command`
/// to the chosen shell as a single, unmodified string.
pub(crate) fn spawn(
    interpreter: &Path,
    shell_kind: &str,
    command: &str,
    cwd: Option<&Path>,
    env: &HashMap<String, String>,
) -> io::Result<Child> {
    let mut cmd = Command::new(interpreter);
    cmd.args(shell_args(shell_kind, command))
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    // Own process group so teardown can take grandchildren with it.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd.spawn()
}

/// Argument list for the shell family, with interactive/rc startup disabled.
fn shell_args(shell_kind: &str, command: &str) -> Vec<OsString> {
    match shell_kind {
        // /d disables AutoRun commands, /s preserves the quoting of the
        // command string.
        "cmd" => ["/d", "/s", "/c", command]
            .iter()
            .map(OsString::from)
            .collect(),
        // Non-interactive bash still reads rc files when invoked over ssh;
        // shut that door explicitly.
        "bash" => ["--noprofile", "--norc", "-c", command]
            .iter()
            .map(OsString::from)
            .collect(),
        _ => ["-c", command].iter().map(OsString::from).collect(),
    }
}

fn shell_kind(shell: &str) -> String {
    Path::new(shell)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(shell)
        .to_ascii_lowercase()
}

/// Forcibly terminate the child. On Unix this kills the whole process
/// group, so pipes held open by grandchildren close too.
pub(crate) fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let pgid = child.id() as i32;
        let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
        if rc == 0 {
            return;
        }
    }

    if let Err(e) = child.kill() {
        warn!(pid = child.id(), error = %e, "failed to kill child process");
    }
}

/// Map an exit status to the result code: the child's own code when it
/// exited, `128 + signal` when a signal terminated it.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    INTERNAL_FAILURE_CODE
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        #[cfg(windows)]
        for ext in ["exe", "cmd", "bat"] {
            let candidate = dir.join(format!("{name}.{ext}"));
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
