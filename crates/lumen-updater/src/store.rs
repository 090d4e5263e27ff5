//! Durable record of the installed version.
//!
//! The store is a single plain-text file holding the normalized version and
//! nothing else. Writes go through a temp file in the same directory, are
//! synced, and then renamed over the target, so a crash at any point leaves
//! either the old value or the new one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Result, UpdateError};
use crate::version::VersionString;

/// Default file name of the version record.
pub const VERSION_FILE_NAME: &str = "version.txt";

/// Read and write access to the installed-version record.
pub trait VersionRecord: Send + Sync {
    /// Current raw contents, or `None` when nothing has been recorded.
    fn read(&self) -> Result<Option<String>>;

    /// Atomically replace the record with `version`.
    fn write(&self, version: &VersionString) -> Result<()>;
}

/// File-backed version store.
#[derive(Debug, Clone)]
pub struct VersionStore {
    path: PathBuf,
}

impl VersionStore {
    /// Store backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `version` to a synced temp file beside the record without
    /// touching the record itself.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Persistence`] if the directory or temp file
    /// cannot be created or written.
    pub fn stage(&self, version: &VersionString) -> Result<StagedVersion> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        fs::create_dir_all(dir).map_err(|e| self.persistence_error(e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| self.persistence_error(e))?;
        temp.write_all(version.to_string().as_bytes())
            .map_err(|e| self.persistence_error(e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| self.persistence_error(e))?;

        Ok(StagedVersion {
            temp,
            target: self.path.clone(),
        })
    }

    fn persistence_error(&self, source: io::Error) -> UpdateError {
        UpdateError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

impl VersionRecord for VersionStore {
    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let content = content.trim();
                Ok((!content.is_empty()).then(|| content.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(UpdateError::Io(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write(&self, version: &VersionString) -> Result<()> {
        self.stage(version)?.commit()?;
        tracing::info!(
            target: "update.persist",
            version = %version,
            path = %self.path.display(),
            "Recorded installed version"
        );
        Ok(())
    }
}

/// A fully written temp file waiting to replace the version record.
///
/// Dropping it without calling [`StagedVersion::commit`] removes the temp
/// file and leaves the record unchanged.
#[derive(Debug)]
pub struct StagedVersion {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedVersion {
    /// Atomically rename the staged file over the record.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Persistence`] if the rename fails.
    pub fn commit(self) -> Result<()> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| UpdateError::Persistence {
                path: target.clone(),
                source: e.error,
            })?;
        sync_parent_dir(&target);
        Ok(())
    }
}

#[cfg(unix)]
fn sync_parent_dir(target: &Path) {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::File::open(parent).and_then(|dir| dir.sync_all()) {
            tracing::debug!("Could not sync {}: {e}", parent.display());
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_target: &Path) {}
