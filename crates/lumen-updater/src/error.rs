//! Error types for the update orchestrator.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during an update run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpdateError {
    /// The helper was invoked with the wrong arguments.
    #[error("usage error: {0}")]
    Usage(String),

    /// Failed to parse version string.
    #[error("invalid version format: {0}")]
    InvalidVersion(String),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Matching processes survived every termination pass.
    #[error("{survivors} process(es) named '{name}' are still running")]
    Termination {
        /// Executable name that was targeted.
        name: String,
        /// Number of processes still alive after the last pass.
        survivors: usize,
    },

    /// The installer (or its wrapper) could not be started.
    #[error("failed to launch '{}': {source}", path.display())]
    InstallerLaunch {
        /// Program that failed to start.
        path: PathBuf,
        /// Underlying spawn error.
        #[source]
        source: io::Error,
    },

    /// The installer ran and reported a non-zero exit code.
    #[error("installer exited with code {code}")]
    InstallerExit {
        /// Exit code reported by the installer.
        code: i32,
    },

    /// The installer file does not exist.
    #[error("installer not found: {}", .0.display())]
    InstallerMissing(PathBuf),

    /// The installer failed without an exit code (killed by a signal, detached wrapper lost).
    #[error("installation error: {0}")]
    Installation(String),

    /// Archive extraction failed.
    #[error("archive extraction error: {0}")]
    ArchiveExtraction(String),

    /// The new version could not be written to the version store.
    #[error("failed to record version in '{}': {source}", path.display())]
    Persistence {
        /// Version store file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The application could not be restarted.
    #[error("failed to restart '{}': {source}", path.display())]
    Restart {
        /// Application executable.
        path: PathBuf,
        /// Underlying spawn error.
        #[source]
        source: io::Error,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Coarse classification used for exit codes and recovery decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad invocation or unparseable version.
    Usage,
    /// Configuration file problems.
    Config,
    /// Process termination problems (recovered locally).
    Termination,
    /// Installer could not be started, was missing, or could not be extracted.
    InstallerLaunch,
    /// Installer ran and failed.
    InstallerExit,
    /// Installed, but the version record is stale.
    Persistence,
    /// Installed and recorded, but the app did not restart (recovered locally).
    Restart,
    /// Anything else.
    Io,
}

impl UpdateError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage(_) | Self::InvalidVersion(_) => ErrorKind::Usage,
            Self::Config(_) => ErrorKind::Config,
            Self::Termination { .. } => ErrorKind::Termination,
            Self::InstallerLaunch { .. } | Self::InstallerMissing(_) | Self::ArchiveExtraction(_) => {
                ErrorKind::InstallerLaunch
            }
            Self::InstallerExit { .. } | Self::Installation(_) => ErrorKind::InstallerExit,
            Self::Persistence { .. } => ErrorKind::Persistence,
            Self::Restart { .. } => ErrorKind::Restart,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Returns whether this error ends the run in the `Failed` state.
    ///
    /// Termination and restart errors are logged and the run continues.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Termination | ErrorKind::Restart)
    }

    /// Returns a user-friendly error message suitable for a status popup.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Usage(_) | Self::InvalidVersion(_) => {
                "The updater was started with invalid arguments."
            }
            Self::Config(_) => "The updater configuration could not be read.",
            Self::Termination { .. } => "The application could not be closed before updating.",
            Self::InstallerLaunch { .. } | Self::InstallerMissing(_) => {
                "The installer could not be started."
            }
            Self::ArchiveExtraction(_) => "Could not extract the update package.",
            Self::InstallerExit { .. } | Self::Installation(_) => "Update failed.",
            Self::Persistence { .. } => {
                "The update was installed, but the recorded version is stale."
            }
            Self::Restart { .. } => "The update was installed. Please start the application again.",
            Self::Io(_) => "An unexpected error occurred.",
        }
    }

    /// Text for the `failed` status: the user-facing message followed by the detail.
    #[must_use]
    pub fn status_message(&self) -> String {
        format!("{} ({self})", self.user_message())
    }
}

impl From<io::Error> for UpdateError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<zip::result::ZipError> for UpdateError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::ArchiveExtraction(err.to_string())
    }
}

/// Result type alias for update operations.
pub type Result<T> = std::result::Result<T, UpdateError>;
