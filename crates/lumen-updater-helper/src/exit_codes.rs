//! Exit codes for the update helper.
//!
//! The application that spawned the helper can read the outcome from the
//! exit code alone:
//! - 0: update installed (restart problems and a declined restart included)
//! - 2: bad invocation, also used by clap for argument errors
//! - 10-19: the update did not complete
//! - 20: internal error

use lumen_updater::{ErrorKind, RunReport, UpdateError};

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Installed and recorded.
    Success = 0,
    /// Wrong arguments or unparseable version.
    Usage = 2,
    /// The installer failed or could not be started.
    InstallFailed = 10,
    /// Installed, but the version record could not be written.
    PersistenceFailed = 11,
    /// The configuration could not be loaded.
    ConfigError = 12,
    /// Anything else.
    Internal = 20,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Stable name for logs.
    #[must_use]
    pub const fn code_name(self) -> &'static str {
        match self {
            Self::Success => "OK_SUCCESS",
            Self::Usage => "ERR_USAGE",
            Self::InstallFailed => "ERR_INSTALL",
            Self::PersistenceFailed => "ERR_PERSIST",
            Self::ConfigError => "ERR_CONFIG",
            Self::Internal => "ERR_INTERNAL",
        }
    }

    /// Exit code for an error that ended the run.
    #[must_use]
    pub fn from_error(error: &UpdateError) -> Self {
        match error.kind() {
            ErrorKind::Usage => Self::Usage,
            ErrorKind::Config => Self::ConfigError,
            ErrorKind::InstallerLaunch | ErrorKind::InstallerExit => Self::InstallFailed,
            ErrorKind::Persistence => Self::PersistenceFailed,
            ErrorKind::Termination | ErrorKind::Restart | ErrorKind::Io => Self::Internal,
        }
    }

    /// Exit code for a finished run.
    ///
    /// Recovered errors (termination, restart) never change the code.
    #[must_use]
    pub fn from_report(report: &RunReport) -> Self {
        match &report.error {
            Some(error) if error.is_fatal() => Self::from_error(error),
            _ if report.is_success() => Self::Success,
            _ => Self::Internal,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}
