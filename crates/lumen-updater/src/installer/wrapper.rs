//! Run the installer through a disposable wrapper script.
//!
//! The script is written next to the installer, runs it with the silent
//! flags, deletes itself and exits with the installer's exit code. It is
//! started through an explicitly named interpreter, never through a shell
//! lookup.

use std::fs;
use std::path::{Path, PathBuf};

use super::{
    InstallOutcome, InstallerStrategy, ProgressMode, ensure_installer_exists, log_installer_output,
};
use crate::config::default_silent_args;
use crate::error::{Result, UpdateError};
use crate::process;
use crate::status::{Progress, StatusReporter};

#[cfg(windows)]
const SCRIPT_EXTENSION: &str = "cmd";
#[cfg(not(windows))]
const SCRIPT_EXTENSION: &str = "sh";

/// Runs the installer via a self-deleting wrapper script.
#[derive(Debug, Clone)]
pub struct WrapperScript {
    args: Vec<String>,
    detach: bool,
}

impl WrapperScript {
    /// Strategy passing `args` to the installer.
    #[must_use]
    pub fn new(args: Vec<String>) -> Self {
        Self {
            args,
            detach: false,
        }
    }

    /// Do not wait for the wrapper. Success then only means it was started.
    #[must_use]
    pub fn detached(mut self, detach: bool) -> Self {
        self.detach = detach;
        self
    }

    /// Path of the wrapper script for `installer`.
    #[must_use]
    pub fn script_path(installer: &Path) -> PathBuf {
        let stem = installer
            .file_stem()
            .map_or_else(|| "installer".into(), |s| s.to_string_lossy());
        installer.with_file_name(format!(
            "{stem}-wrapper-{}.{SCRIPT_EXTENSION}",
            std::process::id()
        ))
    }

    /// Script text that runs `installer` with this strategy's flags.
    #[must_use]
    pub fn render_script(&self, installer: &Path) -> String {
        render(installer, &self.args)
    }
}

impl Default for WrapperScript {
    fn default() -> Self {
        Self::new(default_silent_args())
    }
}

#[cfg(windows)]
fn render(installer: &Path, args: &[String]) -> String {
    let quote = |s: &str| format!("\"{}\"", s.replace('%', "%%").replace('"', "\"\""));
    let mut invocation = quote(&installer.to_string_lossy());
    for arg in args {
        invocation.push(' ');
        invocation.push_str(&quote(arg));
    }
    // `(goto)` unloads the batch file so it can delete itself; the exit code is
    // expanded before that happens.
    format!(
        "@echo off\r\n{invocation}\r\nset LUMEN_INSTALL_EXIT=%ERRORLEVEL%\r\n(goto) 2>nul & del \"%~f0\" & exit /b %LUMEN_INSTALL_EXIT%\r\n"
    )
}

#[cfg(not(windows))]
fn render(installer: &Path, args: &[String]) -> String {
    let quote = |s: &str| format!("'{}'", s.replace('\'', r"'\''"));
    let mut invocation = quote(&installer.to_string_lossy());
    for arg in args {
        invocation.push(' ');
        invocation.push_str(&quote(arg));
    }
    format!("#!/bin/sh\n{invocation}\nstatus=$?\nrm -f \"$0\"\nexit $status\n")
}

#[cfg(windows)]
fn interpreter(script: &Path) -> (PathBuf, Vec<std::ffi::OsString>) {
    let cmd = std::env::var_os("ComSpec").map_or_else(|| PathBuf::from("cmd.exe"), PathBuf::from);
    (cmd, vec!["/D".into(), "/C".into(), script.as_os_str().to_owned()])
}

#[cfg(not(windows))]
fn interpreter(script: &Path) -> (PathBuf, Vec<std::ffi::OsString>) {
    (PathBuf::from("/bin/sh"), vec![script.as_os_str().to_owned()])
}

impl InstallerStrategy for WrapperScript {
    fn name(&self) -> &'static str {
        "wrapper"
    }

    fn progress_mode(&self) -> ProgressMode {
        ProgressMode::Indeterminate
    }

    fn install(&self, installer: &Path, reporter: &dyn StatusReporter) -> Result<InstallOutcome> {
        ensure_installer_exists(installer)?;
        reporter.progress(Progress::Indeterminate);

        let script = Self::script_path(installer);
        fs::write(&script, self.render_script(installer)).map_err(|e| {
            UpdateError::Io(format!("failed to write wrapper {}: {e}", script.display()))
        })?;
        tracing::info!(
            target: "update.install",
            installer = %installer.display(),
            wrapper = %script.display(),
            detach = self.detach,
            "Running installer through wrapper"
        );

        let (program, args) = interpreter(&script);
        let launch_error = |source| {
            let _ = fs::remove_file(&script);
            UpdateError::InstallerLaunch {
                path: program.clone(),
                source,
            }
        };

        if self.detach {
            let pid = process::spawn_detached(&program, &args).map_err(launch_error)?;
            tracing::warn!(
                target: "update.install",
                pid,
                "Wrapper detached; installer result is not observed"
            );
            return Ok(InstallOutcome::Success);
        }

        let report = process::run(&program, &args).map_err(launch_error)?;
        log_installer_output(&report);
        tracing::info!(target: "update.install", exit_code = ?report.code, "Wrapper finished");
        Ok(InstallOutcome::from_exit_code(report.code))
    }
}
