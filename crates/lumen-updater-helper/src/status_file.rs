//! Update status file for post-update feedback.
//!
//! Written once per run next to the version record so the restarted
//! application can tell the user what happened. [`StatusFileReporter`]
//! writes it when the terminal status is emitted, which is before the
//! application is relaunched.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lumen_updater::{StatusEvent, StatusReporter};
use serde::{Deserialize, Serialize};

/// File name of the status record inside the data directory.
pub const STATUS_FILE_NAME: &str = "update_status.json";

/// Status of an update operation, written by the helper and read by the app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatus {
    /// Whether the update was successful.
    pub success: bool,
    /// Version that was installed.
    pub version: String,
    /// Version recorded before the update, if any.
    #[serde(default)]
    pub previous_version: Option<String>,
    /// Timestamp of update.
    pub timestamp: DateTime<Utc>,
    /// Error message if failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Path to log file for debugging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl UpdateStatus {
    /// Creates a new successful status.
    pub fn success(
        version: String,
        previous_version: Option<String>,
        log_file: Option<PathBuf>,
    ) -> Self {
        Self {
            success: true,
            version,
            previous_version,
            timestamp: Utc::now(),
            error: None,
            log_file,
        }
    }

    /// Creates a new failed status.
    pub fn failure(
        version: String,
        previous_version: Option<String>,
        error: String,
        log_file: Option<PathBuf>,
    ) -> Self {
        Self {
            success: false,
            version,
            previous_version,
            timestamp: Utc::now(),
            error: Some(error),
            log_file,
        }
    }

    /// Writes the status to `path` through a temp file and rename.
    pub fn write_to(&self, path: &Path) -> Result<(), String> {
        let dir = path
            .parent()
            .ok_or_else(|| format!("Status path has no parent: {:?}", path))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("Failed to create status directory: {}", e))?;

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize status: {}", e))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| format!("Failed to create status file: {}", e))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| format!("Failed to write status file: {}", e))?;
        temp.persist(path)
            .map_err(|e| format!("Failed to write status file: {}", e.error))?;

        tracing::debug!("Status written to: {:?}", path);
        Ok(())
    }

    /// Reads the status from `path`.
    pub fn read_from(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// Reporter that turns the run's terminal event into the status file.
#[derive(Debug, Clone)]
pub struct StatusFileReporter {
    path: PathBuf,
    version: String,
    previous_version: Option<String>,
    log_file: Option<PathBuf>,
}

impl StatusFileReporter {
    pub fn new(
        path: PathBuf,
        version: String,
        previous_version: Option<String>,
        log_file: Option<PathBuf>,
    ) -> Self {
        Self {
            path,
            version,
            previous_version,
            log_file,
        }
    }
}

impl StatusReporter for StatusFileReporter {
    fn report(&self, event: StatusEvent) {
        let status = match event {
            StatusEvent::Progress { .. } => return,
            StatusEvent::Succeeded { .. } => UpdateStatus::success(
                self.version.clone(),
                self.previous_version.clone(),
                self.log_file.clone(),
            ),
            StatusEvent::Failed { message } => UpdateStatus::failure(
                self.version.clone(),
                self.previous_version.clone(),
                message,
                self.log_file.clone(),
            ),
        };
        if let Err(error) = status.write_to(&self.path) {
            tracing::warn!(%error, path = %self.path.display(), "Could not write update status");
        }
    }
}
