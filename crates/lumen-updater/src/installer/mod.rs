//! Installer delivery strategies.
//!
//! Every strategy takes the installer path, runs it its own way, and returns
//! an [`InstallOutcome`]. Errors are reserved for failures to get the
//! installer running at all (missing file, spawn failure, bad archive).

mod archive;
mod direct;
mod extract;
mod wrapper;

pub use archive::ArchiveRun;
pub use direct::DirectSilent;
pub use extract::{ArchiveType, detect_archive_type, extract_archive};
pub use wrapper::WrapperScript;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::config::StrategyConfig;
use crate::error::{Result, UpdateError};
use crate::process::ExitReport;
use crate::status::StatusReporter;

/// Result of running the installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The installer reported success.
    Success,
    /// The installer reported failure.
    Failure {
        /// Human-readable reason.
        reason: String,
        /// Installer exit code, when one was observed.
        exit_code: Option<i32>,
    },
}

impl InstallOutcome {
    /// Whether the installer succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Outcome for a process that ran to completion.
    #[must_use]
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Success,
            Some(code) => Self::Failure {
                reason: format!("installer exited with code {code}"),
                exit_code: Some(code),
            },
            None => Self::Failure {
                reason: "installer was terminated before it finished".to_string(),
                exit_code: None,
            },
        }
    }

    /// The error equivalent of a failed outcome.
    #[must_use]
    pub fn to_error(&self) -> Option<UpdateError> {
        match self {
            Self::Success => None,
            Self::Failure {
                exit_code: Some(code),
                ..
            } => Some(UpdateError::InstallerExit { code: *code }),
            Self::Failure { reason, .. } => Some(UpdateError::Installation(reason.clone())),
        }
    }
}

impl fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure { reason, .. } => write!(f, "{reason}"),
        }
    }
}

/// Whether a strategy reports real progress ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Percent ticks are reported.
    Determinate,
    /// Only an indeterminate indicator is reported.
    Indeterminate,
}

/// A way of running an installer.
pub trait InstallerStrategy: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// What kind of progress this strategy reports.
    fn progress_mode(&self) -> ProgressMode;

    /// Run the installer at `installer` to completion.
    ///
    /// Progress is reported only until this returns.
    ///
    /// # Errors
    ///
    /// Returns an error when the installer cannot be found, prepared, or started.
    fn install(&self, installer: &Path, reporter: &dyn StatusReporter) -> Result<InstallOutcome>;
}

/// Build the configured strategy.
#[must_use]
pub fn strategy_from_config(config: &StrategyConfig) -> Box<dyn InstallerStrategy> {
    match config {
        StrategyConfig::Direct { args } => Box::new(DirectSilent::new(args.clone())),
        StrategyConfig::Wrapper { args, detach } => {
            Box::new(WrapperScript::new(args.clone()).detached(*detach))
        }
        StrategyConfig::Archive {
            installer_name,
            args,
            poll_interval_ms,
        } => Box::new(ArchiveRun::new(
            installer_name.clone(),
            args.clone(),
            Duration::from_millis(*poll_interval_ms),
        )),
    }
}

fn ensure_installer_exists(installer: &Path) -> Result<()> {
    if installer.is_file() {
        Ok(())
    } else {
        Err(UpdateError::InstallerMissing(installer.to_path_buf()))
    }
}

fn log_installer_output(report: &ExitReport) {
    for line in report.stdout.lines().filter(|l| !l.trim().is_empty()) {
        tracing::debug!(target: "update.install", "installer: {line}");
    }
    for line in report.stderr.lines().filter(|l| !l.trim().is_empty()) {
        tracing::debug!(target: "update.install", "installer (stderr): {line}");
    }
}

/// Write a small executable shell script for tests.
#[cfg(all(test, unix))]
pub(crate) fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_exit_code() {
        assert!(InstallOutcome::from_exit_code(Some(0)).is_success());

        let failure = InstallOutcome::from_exit_code(Some(1603));
        assert_eq!(failure.to_string(), "installer exited with code 1603");
        assert!(matches!(
            failure.to_error(),
            Some(UpdateError::InstallerExit { code: 1603 })
        ));

        let killed = InstallOutcome::from_exit_code(None);
        assert!(matches!(killed.to_error(), Some(UpdateError::Installation(_))));
    }

    #[test]
    fn test_strategy_from_config() {
        assert_eq!(strategy_from_config(&StrategyConfig::default()).name(), "direct");
        assert_eq!(strategy_from_config(&StrategyConfig::wrapper()).name(), "wrapper");
        let archive = strategy_from_config(&StrategyConfig::archive());
        assert_eq!(archive.name(), "archive");
        assert_eq!(archive.progress_mode(), ProgressMode::Determinate);
    }
}
