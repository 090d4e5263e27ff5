//! Configuration for the updater.
//!
//! Settings come from a JSON file. The file is found in this order:
//!
//! 1. an explicit path (the helper's `--config` flag)
//! 2. the `LUMEN_UPDATER_CONFIG` environment variable
//! 3. `updater.json` in the application data directory, if it exists
//!
//! When none of these apply the built-in defaults are used.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::VERSION_FILE_NAME;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "LUMEN_UPDATER_CONFIG";

/// Environment variable overriding the per-user data root.
pub const DATA_DIR_ENV: &str = "LUMEN_UPDATER_DATA_DIR";

/// Config file name looked up in the application data directory.
pub const CONFIG_FILE_NAME: &str = "updater.json";

/// Default application data directory name under the per-user data root.
pub const DEFAULT_APP_DATA_DIR: &str = "Lumen";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`UpdaterConfig`].
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// No per-user data directory could be determined.
    #[error("could not determine the user data directory")]
    NoDataDir,
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicit path given by the caller.
    Explicit(PathBuf),
    /// Path from [`CONFIG_ENV`].
    Environment(PathBuf),
    /// `updater.json` in the data directory.
    DataDir(PathBuf),
    /// Built-in defaults.
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(path) => write!(f, "{} (--config)", path.display()),
            Self::Environment(path) => write!(f, "{} (${CONFIG_ENV})", path.display()),
            Self::DataDir(path) => write!(f, "{}", path.display()),
            Self::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Termination retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminationConfig {
    /// Extra termination passes after the first one.
    pub retries: u32,
    /// Delay before re-checking for survivors.
    pub retry_delay_ms: u64,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl TerminationConfig {
    /// Delay between passes.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Installer delivery strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Run the installer directly with silent flags and wait for it.
    Direct {
        /// Flags passed to the installer.
        #[serde(default = "default_silent_args")]
        args: Vec<String>,
    },
    /// Run the installer through a self-deleting wrapper script.
    Wrapper {
        /// Flags passed to the installer.
        #[serde(default = "default_silent_args")]
        args: Vec<String>,
        /// Fire and forget: success only means the wrapper started.
        #[serde(default)]
        detach: bool,
    },
    /// Extract an archive, then run the installer found inside it.
    Archive {
        /// Path of the installer relative to the extraction root.
        #[serde(default = "default_archive_installer")]
        installer_name: PathBuf,
        /// Flags passed to the extracted installer.
        #[serde(default = "default_archive_args")]
        args: Vec<String>,
        /// Interval between completion checks.
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::Direct {
            args: default_silent_args(),
        }
    }
}

impl StrategyConfig {
    /// Default settings for the wrapper strategy.
    #[must_use]
    pub fn wrapper() -> Self {
        Self::Wrapper {
            args: default_silent_args(),
            detach: false,
        }
    }

    /// Default settings for the archive strategy.
    #[must_use]
    pub fn archive() -> Self {
        Self::Archive {
            installer_name: default_archive_installer(),
            args: default_archive_args(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }

    /// Short name for logging.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::Wrapper { .. } => "wrapper",
            Self::Archive { .. } => "archive",
        }
    }
}

/// Silent flags understood by common Windows installers.
#[must_use]
pub fn default_silent_args() -> Vec<String> {
    vec!["/silent".to_string(), "/norestart".to_string()]
}

fn default_archive_args() -> Vec<String> {
    vec!["/S".to_string()]
}

fn default_archive_installer() -> PathBuf {
    PathBuf::from("setup.exe")
}

const fn default_poll_interval_ms() -> u64 {
    500
}

/// Updater settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Directory name under the per-user data root.
    pub app_data_dir: String,
    /// File name of the version record inside the data directory.
    pub version_file: String,
    /// Wait for the user to acknowledge success before restarting.
    pub interactive: bool,
    /// Pause before relaunching the application.
    pub restart_delay_ms: u64,
    /// Termination retry settings.
    pub termination: TerminationConfig,
    /// Installer delivery strategy.
    pub strategy: StrategyConfig,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            app_data_dir: DEFAULT_APP_DATA_DIR.to_string(),
            version_file: VERSION_FILE_NAME.to_string(),
            interactive: true,
            restart_delay_ms: 2000,
            termination: TerminationConfig::default(),
            strategy: StrategyConfig::default(),
        }
    }
}

impl UpdaterConfig {
    /// Parse configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed input; `origin` is used
    /// in the error message.
    pub fn from_json(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Read configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content, path)
    }

    /// Load configuration using the process environment.
    ///
    /// # Errors
    ///
    /// Propagates read and parse errors for explicitly named files.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, ConfigSource), ConfigError> {
        Self::resolve_with(explicit, std::env::var_os(CONFIG_ENV), data_root())
    }

    /// Load configuration from explicit inputs.
    ///
    /// A data-directory config that does not exist falls through to defaults;
    /// explicitly named files must exist.
    ///
    /// # Errors
    ///
    /// Propagates read and parse errors.
    pub fn resolve_with(
        explicit: Option<&Path>,
        env_value: Option<OsString>,
        data_root: Option<PathBuf>,
    ) -> Result<(Self, ConfigSource), ConfigError> {
        if let Some(path) = explicit {
            return Ok((
                Self::from_file(path)?,
                ConfigSource::Explicit(path.to_path_buf()),
            ));
        }

        if let Some(path) = env_value.filter(|v| !v.is_empty()).map(PathBuf::from) {
            let config = Self::from_file(&path)?;
            return Ok((config, ConfigSource::Environment(path)));
        }

        if let Some(root) = data_root {
            let path = root.join(DEFAULT_APP_DATA_DIR).join(CONFIG_FILE_NAME);
            if path.is_file() {
                let config = Self::from_file(&path)?;
                return Ok((config, ConfigSource::DataDir(path)));
            }
        }

        Ok((Self::default(), ConfigSource::Defaults))
    }

    /// Pause before relaunching the application.
    #[must_use]
    pub const fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    /// Application data directory under `root`.
    #[must_use]
    pub fn data_dir_in(&self, root: &Path) -> PathBuf {
        root.join(&self.app_data_dir)
    }

    /// Application data directory under the per-user data root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoDataDir`] when no root can be determined.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        data_root()
            .map(|root| self.data_dir_in(&root))
            .ok_or(ConfigError::NoDataDir)
    }

    /// Version record path inside `data_dir`.
    #[must_use]
    pub fn version_file_in(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.version_file)
    }
}

/// Per-user data root (`%APPDATA%`, `~/Library/Application Support`,
/// `$XDG_DATA_HOME`), overridable with [`DATA_DIR_ENV`].
#[must_use]
pub fn data_root() -> Option<PathBuf> {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::data_dir)
}
