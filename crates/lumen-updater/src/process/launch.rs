//! Child process launching.
//!
//! Programs are always started directly with an explicit argument list. No
//! shell is involved, so paths and arguments are never re-parsed.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// How to start a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Block until the child exits and capture its output.
    Wait,
    /// Start the child and return immediately.
    Detached,
}

/// Result of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, or `None` if the child was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ExitReport {
    /// Whether the child exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Handle for a launched child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessHandle {
    /// The child ran to completion.
    Exited(ExitReport),
    /// The child is running independently.
    Detached {
        /// Process ID of the child.
        pid: u32,
    },
}

/// Something that can start programs. Abstracted so the restart step can be
/// observed in tests.
pub trait Launcher: Send + Sync {
    /// Start `program` with `args` in the given mode.
    ///
    /// # Errors
    ///
    /// Returns the spawn error when the program is missing or not executable.
    fn launch(&self, program: &Path, args: &[String], mode: LaunchMode) -> io::Result<ProcessHandle>;
}

/// Launcher backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, program: &Path, args: &[String], mode: LaunchMode) -> io::Result<ProcessHandle> {
        launch(program, args, mode)
    }
}

/// Start `program` with `args` in the given mode.
///
/// # Errors
///
/// Returns the spawn or wait error.
pub fn launch<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
    mode: LaunchMode,
) -> io::Result<ProcessHandle> {
    match mode {
        LaunchMode::Wait => run(program, args).map(ProcessHandle::Exited),
        LaunchMode::Detached => spawn_detached(program, args).map(|pid| ProcessHandle::Detached { pid }),
    }
}

/// Run `program` to completion, capturing its output.
///
/// # Errors
///
/// Returns the spawn or wait error.
pub fn run<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> io::Result<ExitReport> {
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());
    hide_console(&mut command);

    let output = command.output()?;
    Ok(ExitReport {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Start `program` without waiting, returning the child for polling.
///
/// Standard streams are discarded.
///
/// # Errors
///
/// Returns the spawn error.
pub fn spawn<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> io::Result<Child> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    hide_console(&mut command);
    command.spawn()
}

/// Start `program` fully detached from the updater and return its PID.
///
/// # Errors
///
/// Returns the spawn error.
pub fn spawn_detached<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> io::Result<u32> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    // Relative programs resolve against the updater's directory, so only
    // absolute ones get their own working directory.
    if let Some(dir) = program
        .parent()
        .filter(|d| program.is_absolute() && d.is_dir())
    {
        command.current_dir(dir);
    }
    detach(&mut command);

    let child = command.spawn()?;
    Ok(child.id())
}

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

#[cfg(windows)]
fn hide_console(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console(_command: &mut Command) {}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    // New process group, so the relaunched app outlives the updater's session signals.
    command.process_group(0);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_run_captures_exit_code_and_output() {
        let report = run(Path::new("/bin/sh"), &["-c", "echo out; echo err >&2; exit 3"]).unwrap();
        assert_eq!(report.code, Some(3));
        assert!(!report.success());
        assert_eq!(report.stdout.trim(), "out");
        assert_eq!(report.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn test_arguments_are_not_shell_parsed() {
        let report = run(Path::new("/bin/echo"), &["$HOME; exit 9", "*"]).unwrap();
        assert!(report.success());
        assert_eq!(report.stdout.trim(), "$HOME; exit 9 *");
    }

    #[cfg(unix)]
    #[test]
    fn test_detached_launch_returns_pid() {
        let handle = launch(Path::new("/bin/sh"), &["-c", "exit 0"], LaunchMode::Detached).unwrap();
        assert!(matches!(handle, ProcessHandle::Detached { pid } if pid > 0));
    }

    #[test]
    fn test_missing_program() {
        let missing = Path::new("/definitely/not/here/lumen-app");
        let err = launch::<&str>(missing, &[], LaunchMode::Wait).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(spawn_detached::<&str>(missing, &[]).is_err());
    }
}
