//! Local update orchestration for the Lumen desktop application.
//!
//! The application downloads an installer, then hands it to the update
//! helper together with its own executable path and the new version tag.
//! This crate provides everything the helper needs to finish the job:
//!
//! - [`process`] finds and kills running instances, and launches children
//! - [`installer`] runs the installer (direct, wrapper script, or archive)
//! - [`store`] durably records the installed version
//! - [`status`] is the boundary to whatever shows progress to the user
//! - [`orchestrator`] sequences the steps and decides what happens on failure
//!
//! # Example
//!
//! ```no_run
//! use lumen_updater::{
//!     Orchestrator, ProcessController, SystemLauncher, UpdateRequest, UpdaterConfig,
//!     VersionStore, installer::strategy_from_config, status::ConsoleReporter,
//! };
//!
//! # fn main() -> lumen_updater::Result<()> {
//! let config = UpdaterConfig::default();
//! let request = UpdateRequest::from_args(["C:\\Temp\\setup.exe", "C:\\App\\App.exe", "v93"])?;
//! let store = VersionStore::new(config.version_file_in(&config.data_dir()?));
//!
//! let report = Orchestrator::new(
//!     Box::new(ProcessController::system(config.termination)),
//!     strategy_from_config(&config.strategy),
//!     Box::new(store),
//!     Box::new(ConsoleReporter::stderr()),
//!     Box::new(SystemLauncher),
//! )
//! .run(&request);
//!
//! println!("finished in state {}", report.final_state);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod error;
pub mod request;
pub mod store;
pub mod version;

// Components
pub mod installer;
pub mod orchestrator;
pub mod process;
pub mod status;

pub use config::{ConfigError, ConfigSource, StrategyConfig, TerminationConfig, UpdaterConfig};
pub use error::{ErrorKind, Result, UpdateError};
pub use installer::{InstallOutcome, InstallerStrategy, ProgressMode};
pub use orchestrator::{AckMode, OrchestrationState, Orchestrator, RunReport};
pub use process::{Launcher, ProcessController, SystemLauncher, Terminate};
pub use request::UpdateRequest;
pub use status::{Progress, StatusEvent, StatusReporter};
pub use store::{VersionRecord, VersionStore};
pub use version::VersionString;
