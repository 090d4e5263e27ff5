//! Run the installer directly in silent mode.

use std::path::Path;

use super::{
    InstallOutcome, InstallerStrategy, ProgressMode, ensure_installer_exists, log_installer_output,
};
use crate::config::default_silent_args;
use crate::error::{Result, UpdateError};
use crate::process;
use crate::status::{Progress, StatusReporter};

/// Runs the installer with silent flags and waits for its exit code.
#[derive(Debug, Clone)]
pub struct DirectSilent {
    args: Vec<String>,
}

impl DirectSilent {
    /// Strategy passing `args` to the installer.
    #[must_use]
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }
}

impl Default for DirectSilent {
    fn default() -> Self {
        Self::new(default_silent_args())
    }
}

impl InstallerStrategy for DirectSilent {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn progress_mode(&self) -> ProgressMode {
        ProgressMode::Indeterminate
    }

    fn install(&self, installer: &Path, reporter: &dyn StatusReporter) -> Result<InstallOutcome> {
        ensure_installer_exists(installer)?;
        reporter.progress(Progress::Indeterminate);

        tracing::info!(
            target: "update.install",
            installer = %installer.display(),
            args = ?self.args,
            "Running installer"
        );
        let report = process::run(installer, &self.args).map_err(|source| {
            UpdateError::InstallerLaunch {
                path: installer.to_path_buf(),
                source,
            }
        })?;
        log_installer_output(&report);

        tracing::info!(target: "update.install", exit_code = ?report.code, "Installer finished");
        Ok(InstallOutcome::from_exit_code(report.code))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::installer::write_script;
    use crate::status::{RecordingReporter, StatusEvent};
    use tempfile::TempDir;

    #[test]
    fn test_success_and_silent_flags() {
        let dir = TempDir::new().unwrap();
        let installer = dir.path().join("setup");
        let seen = dir.path().join("args.txt");
        write_script(&installer, &format!("echo \"$@\" > '{}'\nexit 0", seen.display()));

        let reporter = RecordingReporter::new();
        let outcome = DirectSilent::default().install(&installer, &reporter).unwrap();

        assert_eq!(outcome, InstallOutcome::Success);
        assert_eq!(std::fs::read_to_string(&seen).unwrap().trim(), "/silent /norestart");
        assert_eq!(
            reporter.events(),
            vec![StatusEvent::Progress {
                progress: Progress::Indeterminate
            }]
        );
    }

    #[test]
    fn test_nonzero_exit() {
        let dir = TempDir::new().unwrap();
        let installer = dir.path().join("setup");
        write_script(&installer, "echo 'fatal error during installation' >&2\nexit 1603");

        let outcome = DirectSilent::default()
            .install(&installer, &RecordingReporter::new())
            .unwrap();
        // Unix truncates exit codes to 8 bits.
        assert_eq!(
            outcome,
            InstallOutcome::Failure {
                reason: format!("installer exited with code {}", 1603 % 256),
                exit_code: Some(1603 % 256),
            }
        );
    }

    #[test]
    fn test_missing_installer() {
        let dir = TempDir::new().unwrap();
        let err = DirectSilent::default()
            .install(&dir.path().join("nope"), &RecordingReporter::new())
            .unwrap_err();
        assert!(matches!(err, UpdateError::InstallerMissing(_)));
    }

    #[test]
    fn test_unexecutable_installer() {
        let dir = TempDir::new().unwrap();
        let installer = dir.path().join("setup");
        std::fs::write(&installer, "not a program").unwrap();

        let err = DirectSilent::default()
            .install(&installer, &RecordingReporter::new())
            .unwrap_err();
        assert!(matches!(err, UpdateError::InstallerLaunch { .. }));
    }
}
