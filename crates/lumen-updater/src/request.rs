//! The immutable description of one update run.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Result, UpdateError};
use crate::version::VersionString;

/// Number of positional arguments in the invocation contract.
pub const REQUIRED_ARGS: usize = 3;

/// What to install, what to restart, and which version to record.
///
/// Paths are not checked here; the installer strategy and the restart step
/// report missing files when they reach them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    installer_path: PathBuf,
    app_path: PathBuf,
    target_version: VersionString,
}

impl UpdateRequest {
    /// Create a request from already validated parts.
    #[must_use]
    pub fn new(
        installer_path: impl Into<PathBuf>,
        app_path: impl Into<PathBuf>,
        target_version: VersionString,
    ) -> Self {
        Self {
            installer_path: installer_path.into(),
            app_path: app_path.into(),
            target_version,
        }
    }

    /// Build a request from `<installer> <app> <version>` positional arguments.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Usage`] unless exactly three arguments are given,
    /// and [`UpdateError::InvalidVersion`] when the version does not normalize.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let [installer, app, version] = <[OsString; REQUIRED_ARGS]>::try_from(args)
            .map_err(|args| {
                UpdateError::Usage(format!(
                    "expected {REQUIRED_ARGS} arguments <installer> <app> <version>, got {}",
                    args.len()
                ))
            })?;

        let version = version
            .into_string()
            .map_err(|raw| UpdateError::InvalidVersion(raw.to_string_lossy().into_owned()))?;

        Ok(Self::new(
            installer,
            app,
            VersionString::normalize(&version)?,
        ))
    }

    /// Path to the installer payload.
    #[must_use]
    pub fn installer_path(&self) -> &Path {
        &self.installer_path
    }

    /// Path to the application executable to terminate and restart.
    #[must_use]
    pub fn app_path(&self) -> &Path {
        &self.app_path
    }

    /// Normalized version to record on success.
    #[must_use]
    pub fn target_version(&self) -> VersionString {
        self.target_version
    }

    /// Executable name used to find running instances of the application.
    ///
    /// Both `/` and `\` are treated as separators so Windows-style paths
    /// resolve the same way on every host.
    #[must_use]
    pub fn process_name(&self) -> Option<&str> {
        let raw = self.app_path.to_str()?;
        raw.rsplit(['/', '\\']).next().filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args() {
        let request =
            UpdateRequest::from_args(["C:\\setup.exe", "C:\\App\\App.exe", "v93"]).unwrap();
        assert_eq!(request.installer_path(), Path::new("C:\\setup.exe"));
        assert_eq!(request.target_version().to_string(), "1.93.0");
        assert_eq!(request.process_name(), Some("App.exe"));
    }

    #[test]
    fn test_wrong_argument_count() {
        assert!(matches!(
            UpdateRequest::from_args(["setup.exe", "App.exe"]),
            Err(UpdateError::Usage(_))
        ));
        assert!(matches!(
            UpdateRequest::from_args(["a", "b", "v1", "extra"]),
            Err(UpdateError::Usage(_))
        ));
        assert!(matches!(
            UpdateRequest::from_args(Vec::<String>::new()),
            Err(UpdateError::Usage(_))
        ));
    }

    #[test]
    fn test_invalid_version_argument() {
        assert!(matches!(
            UpdateRequest::from_args(["setup.exe", "App.exe", "latest"]),
            Err(UpdateError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_process_name_unix_path() {
        let request = UpdateRequest::new("/tmp/setup", "/opt/lumen/lumen", VersionString::new(1, 0, 0));
        assert_eq!(request.process_name(), Some("lumen"));

        let request = UpdateRequest::new("/tmp/setup", "/opt/lumen/", VersionString::new(1, 0, 0));
        assert_eq!(request.process_name(), None);
    }
}
