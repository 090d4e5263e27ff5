//! The update state machine.
//!
//! ```text
//! Idle -> TerminatingApp -> Installing -> Verifying
//!     Verifying (success) -> PersistingVersion -> AwaitingUserAck -> Restarting -> Done
//!     Verifying (failure) -> Failed
//!     PersistingVersion (error) -> Failed
//!     AwaitingUserAck (dismissed) -> Done
//! ```
//!
//! Exactly one terminal status (`succeeded` or `failed`) is emitted per run.
//! The version store is written only after a verified success, and the
//! application is restarted only after the store write and, in interactive
//! mode, the user's acknowledgement.

use std::fmt;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::error::UpdateError;
use crate::installer::{InstallOutcome, InstallerStrategy};
use crate::process::{LaunchMode, Launcher, Terminate};
use crate::request::UpdateRequest;
use crate::status::{AckResult, AckSource, StatusReporter};
use crate::store::VersionRecord;

/// State of an update run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationState {
    /// Not started.
    Idle,
    /// Killing running instances of the application.
    TerminatingApp,
    /// The installer strategy is running.
    Installing,
    /// Interpreting the installer outcome.
    Verifying,
    /// Writing the new version to the store.
    PersistingVersion,
    /// Success reported; waiting for the user.
    AwaitingUserAck,
    /// Relaunching the application.
    Restarting,
    /// Terminal: the update did not complete.
    Failed,
    /// Terminal: the update completed.
    Done,
}

impl OrchestrationState {
    /// Whether the run ends in this state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Done)
    }

    /// Get a human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::TerminatingApp => "terminating_app",
            Self::Installing => "installing",
            Self::Verifying => "verifying",
            Self::PersistingVersion => "persisting_version",
            Self::AwaitingUserAck => "awaiting_user_ack",
            Self::Restarting => "restarting",
            Self::Failed => "failed",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Whether the run waits for the user before restarting.
pub enum AckMode {
    /// Restart immediately after reporting success.
    NonInteractive,
    /// Block on the source after reporting success.
    Interactive(Box<dyn AckSource>),
}

impl fmt::Debug for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonInteractive => write!(f, "NonInteractive"),
            Self::Interactive(_) => write!(f, "Interactive"),
        }
    }
}

/// What happened during a run.
#[derive(Debug)]
pub struct RunReport {
    /// Terminal state.
    pub final_state: OrchestrationState,
    /// Every state entered, in order, starting with `Idle`.
    pub transitions: Vec<OrchestrationState>,
    /// Processes killed before installing.
    pub terminated: usize,
    /// Version store contents before the run.
    pub previous_version: Option<String>,
    /// Installer outcome, once the installer ran.
    pub outcome: Option<InstallOutcome>,
    /// The error that moved the run to `Failed`.
    pub error: Option<UpdateError>,
    /// Non-fatal restart failure.
    pub restart_error: Option<UpdateError>,
    /// Whether the application was relaunched.
    pub restarted: bool,
}

impl RunReport {
    fn new() -> Self {
        Self {
            final_state: OrchestrationState::Idle,
            transitions: vec![OrchestrationState::Idle],
            terminated: 0,
            previous_version: None,
            outcome: None,
            error: None,
            restart_error: None,
            restarted: false,
        }
    }

    /// Whether the update was installed and recorded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.final_state == OrchestrationState::Done
    }

    fn enter(&mut self, state: OrchestrationState) {
        tracing::info!(
            target: "update.state",
            from = %self.final_state,
            to = %state,
            "State transition"
        );
        self.final_state = state;
        self.transitions.push(state);
    }

    fn fail(mut self, error: UpdateError) -> Self {
        tracing::error!(target: "update.state", error = %error, "Update failed");
        self.error = Some(error);
        self.enter(OrchestrationState::Failed);
        self
    }
}

/// Drives one update from termination to restart.
pub struct Orchestrator {
    terminator: Box<dyn Terminate>,
    installer: Box<dyn InstallerStrategy>,
    store: Box<dyn VersionRecord>,
    reporter: Box<dyn StatusReporter>,
    launcher: Box<dyn Launcher>,
    ack: AckMode,
    restart_delay: Duration,
}

impl Orchestrator {
    /// Orchestrator over the given components, non-interactive, with no restart delay.
    #[must_use]
    pub fn new(
        terminator: Box<dyn Terminate>,
        installer: Box<dyn InstallerStrategy>,
        store: Box<dyn VersionRecord>,
        reporter: Box<dyn StatusReporter>,
        launcher: Box<dyn Launcher>,
    ) -> Self {
        Self {
            terminator,
            installer,
            store,
            reporter,
            launcher,
            ack: AckMode::NonInteractive,
            restart_delay: Duration::ZERO,
        }
    }

    /// Set the acknowledgement mode.
    #[must_use]
    pub fn with_ack(mut self, ack: AckMode) -> Self {
        self.ack = ack;
        self
    }

    /// Pause between acknowledgement and relaunch.
    #[must_use]
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Run the update described by `request`.
    pub fn run(&self, request: &UpdateRequest) -> RunReport {
        let version = request.target_version();
        let span = tracing::info_span!("update", version = %version);
        let _guard = span.enter();

        let mut report = RunReport::new();
        report.previous_version = match self.store.read() {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(target: "update.persist", error = %e, "Could not read current version");
                None
            }
        };
        tracing::info!(
            installer = %request.installer_path().display(),
            app = %request.app_path().display(),
            previous = report.previous_version.as_deref().unwrap_or("<none>"),
            "Starting update"
        );

        report.enter(OrchestrationState::TerminatingApp);
        self.terminate_app(request, &mut report);

        report.enter(OrchestrationState::Installing);
        tracing::info!(
            target: "update.install",
            strategy = self.installer.name(),
            progress = ?self.installer.progress_mode(),
            "Invoking installer"
        );
        let result = self
            .installer
            .install(request.installer_path(), self.reporter.as_ref());

        report.enter(OrchestrationState::Verifying);
        let (outcome, install_error) = match result {
            Ok(outcome) => {
                let error = outcome.to_error();
                (outcome, error)
            }
            Err(e) => (
                InstallOutcome::Failure {
                    reason: e.to_string(),
                    exit_code: None,
                },
                Some(e),
            ),
        };
        report.outcome = Some(outcome.clone());
        if let Some(error) = install_error {
            self.reporter.failed(&error.status_message());
            return report.fail(error);
        }
        if !request.app_path().exists() {
            tracing::warn!(
                app = %request.app_path().display(),
                "Installer succeeded but the application executable was not found"
            );
        }

        report.enter(OrchestrationState::PersistingVersion);
        if let Err(e) = self.store.write(&version) {
            self.reporter.failed(&e.status_message());
            return report.fail(e);
        }

        report.enter(OrchestrationState::AwaitingUserAck);
        self.reporter
            .succeeded(&format!("Updated to version {version}"));
        if let AckMode::Interactive(source) = &self.ack {
            tracing::info!("Waiting for user acknowledgement");
            if source.wait() == AckResult::Dismissed {
                tracing::warn!(target: "update.restart", "Acknowledgement dismissed; not restarting");
                report.enter(OrchestrationState::Done);
                return report;
            }
        }

        report.enter(OrchestrationState::Restarting);
        self.restart(request, &mut report);

        report.enter(OrchestrationState::Done);
        report
    }

    fn terminate_app(&self, request: &UpdateRequest, report: &mut RunReport) {
        let Some(name) = request.process_name() else {
            tracing::warn!(
                target: "update.terminate",
                app = %request.app_path().display(),
                "Cannot derive a process name from the application path"
            );
            return;
        };
        match self.terminator.terminate(name) {
            Ok(count) => {
                report.terminated = count;
                tracing::info!(target: "update.terminate", process = name, count, "Termination complete");
            }
            Err(e) => {
                tracing::warn!(target: "update.terminate", process = name, error = %e, "Termination incomplete; continuing");
            }
        }
    }

    fn restart(&self, request: &UpdateRequest, report: &mut RunReport) {
        if !self.restart_delay.is_zero() {
            thread::sleep(self.restart_delay);
        }
        let app = request.app_path();
        match self.launcher.launch(app, &[], LaunchMode::Detached) {
            Ok(handle) => {
                report.restarted = true;
                tracing::info!(target: "update.restart", app = %app.display(), ?handle, "Application restarted");
            }
            Err(source) => {
                let error = UpdateError::Restart {
                    path: app.to_path_buf(),
                    source,
                };
                tracing::warn!(target: "update.restart", error = %error, "Restart failed");
                report.restart_error = Some(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::process::ProcessHandle;
    use crate::status::{RecordingReporter, StatusEvent, ack_channel};
    use crate::version::VersionString;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    struct NoProcesses;

    impl Terminate for NoProcesses {
        fn terminate(&self, _process_name: &str) -> Result<usize> {
            Ok(0)
        }
    }

    struct FixedInstaller(InstallOutcome);

    impl InstallerStrategy for FixedInstaller {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn progress_mode(&self) -> crate::installer::ProgressMode {
            crate::installer::ProgressMode::Indeterminate
        }

        fn install(&self, _installer: &Path, _reporter: &dyn StatusReporter) -> Result<InstallOutcome> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        value: Mutex<Option<String>>,
        fail_writes: bool,
    }

    impl VersionRecord for Arc<MemoryStore> {
        fn read(&self) -> Result<Option<String>> {
            Ok(self.value.lock().unwrap().clone())
        }

        fn write(&self, version: &VersionString) -> Result<()> {
            if self.fail_writes {
                return Err(UpdateError::Persistence {
                    path: PathBuf::from("version.txt"),
                    source: io::Error::other("read-only"),
                });
            }
            *self.value.lock().unwrap() = Some(version.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingLauncher {
        launches: Mutex<Vec<(PathBuf, Vec<String>)>>,
    }

    impl Launcher for Arc<RecordingLauncher> {
        fn launch(&self, program: &Path, args: &[String], _mode: LaunchMode) -> io::Result<ProcessHandle> {
            self.launches
                .lock()
                .unwrap()
                .push((program.to_path_buf(), args.to_vec()));
            Ok(ProcessHandle::Detached { pid: 4242 })
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        reporter: Arc<RecordingReporter>,
        launcher: Arc<RecordingLauncher>,
    }

    impl Harness {
        fn new(store: MemoryStore) -> Self {
            Self {
                store: Arc::new(store),
                reporter: Arc::new(RecordingReporter::new()),
                launcher: Arc::new(RecordingLauncher::default()),
            }
        }

        fn orchestrator(&self, outcome: InstallOutcome) -> Orchestrator {
            Orchestrator::new(
                Box::new(NoProcesses),
                Box::new(FixedInstaller(outcome)),
                Box::new(Arc::clone(&self.store)),
                Box::new(Arc::clone(&self.reporter)),
                Box::new(Arc::clone(&self.launcher)),
            )
        }
    }

    fn request() -> UpdateRequest {
        UpdateRequest::from_args(["C:\\setup.exe", "C:\\App\\App.exe", "v93"]).unwrap()
    }

    #[test]
    fn test_success_path() {
        let harness = Harness::new(MemoryStore::default());
        let report = harness.orchestrator(InstallOutcome::Success).run(&request());

        assert!(report.is_success());
        assert_eq!(
            report.transitions,
            vec![
                OrchestrationState::Idle,
                OrchestrationState::TerminatingApp,
                OrchestrationState::Installing,
                OrchestrationState::Verifying,
                OrchestrationState::PersistingVersion,
                OrchestrationState::AwaitingUserAck,
                OrchestrationState::Restarting,
                OrchestrationState::Done,
            ]
        );
        assert_eq!(harness.store.value.lock().unwrap().as_deref(), Some("1.93.0"));
        assert_eq!(
            harness.reporter.terminal_events(),
            vec![StatusEvent::Succeeded {
                message: "Updated to version 1.93.0".to_string()
            }]
        );
        assert_eq!(
            *harness.launcher.launches.lock().unwrap(),
            vec![(PathBuf::from("C:\\App\\App.exe"), Vec::new())]
        );
        assert!(report.restarted);
    }

    #[test]
    fn test_failure_leaves_store_untouched() {
        let harness = Harness::new(MemoryStore {
            value: Mutex::new(Some("1.92.0".to_string())),
            fail_writes: false,
        });
        let report = harness
            .orchestrator(InstallOutcome::from_exit_code(Some(1603)))
            .run(&request());

        assert_eq!(report.final_state, OrchestrationState::Failed);
        assert_eq!(report.previous_version.as_deref(), Some("1.92.0"));
        assert!(matches!(report.error, Some(UpdateError::InstallerExit { code: 1603 })));
        assert_eq!(harness.store.value.lock().unwrap().as_deref(), Some("1.92.0"));
        assert!(harness.launcher.launches.lock().unwrap().is_empty());

        let terminal = harness.reporter.terminal_events();
        assert_eq!(terminal.len(), 1);
        assert!(matches!(
            &terminal[0],
            StatusEvent::Failed { message }
                if message.starts_with("Update failed.") && message.contains("1603")
        ));
    }

    #[test]
    fn test_persistence_error_is_distinct() {
        let harness = Harness::new(MemoryStore {
            value: Mutex::new(None),
            fail_writes: true,
        });
        let report = harness.orchestrator(InstallOutcome::Success).run(&request());

        assert_eq!(report.final_state, OrchestrationState::Failed);
        assert!(matches!(report.error, Some(UpdateError::Persistence { .. })));
        assert!(harness.launcher.launches.lock().unwrap().is_empty());
        let terminal = harness.reporter.terminal_events();
        assert_eq!(terminal.len(), 1);
        assert!(matches!(&terminal[0], StatusEvent::Failed { message } if message.contains("stale")));
    }

    #[test]
    fn test_interactive_waits_for_acknowledgement() {
        let harness = Harness::new(MemoryStore::default());
        let (tx, rx) = ack_channel();
        let orchestrator = harness
            .orchestrator(InstallOutcome::Success)
            .with_ack(AckMode::Interactive(Box::new(rx)));

        let reporter = Arc::clone(&harness.reporter);
        let launcher = Arc::clone(&harness.launcher);
        let acknowledger = thread::spawn(move || {
            while reporter.terminal_events().is_empty() {
                thread::sleep(Duration::from_millis(5));
            }
            // Success is reported but nothing has been relaunched yet.
            let launched_early = !launcher.launches.lock().unwrap().is_empty();
            tx.acknowledge();
            launched_early
        });

        let report = orchestrator.run(&request());
        assert!(!acknowledger.join().unwrap());
        assert!(report.restarted);
        assert_eq!(harness.launcher.launches.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dismissed_acknowledgement_skips_restart() {
        let harness = Harness::new(MemoryStore::default());
        let (tx, rx) = ack_channel();
        drop(tx);
        let report = harness
            .orchestrator(InstallOutcome::Success)
            .with_ack(AckMode::Interactive(Box::new(rx)))
            .run(&request());

        assert_eq!(report.final_state, OrchestrationState::Done);
        assert!(!report.transitions.contains(&OrchestrationState::Restarting));
        assert!(harness.launcher.launches.lock().unwrap().is_empty());
        assert_eq!(harness.store.value.lock().unwrap().as_deref(), Some("1.93.0"));
    }

    #[test]
    fn test_termination_failure_is_swallowed() {
        struct Stubborn;
        impl Terminate for Stubborn {
            fn terminate(&self, process_name: &str) -> Result<usize> {
                Err(UpdateError::Termination {
                    name: process_name.to_string(),
                    survivors: 1,
                })
            }
        }

        let harness = Harness::new(MemoryStore::default());
        let orchestrator = Orchestrator::new(
            Box::new(Stubborn),
            Box::new(FixedInstaller(InstallOutcome::Success)),
            Box::new(Arc::clone(&harness.store)),
            Box::new(Arc::clone(&harness.reporter)),
            Box::new(Arc::clone(&harness.launcher)),
        );

        assert!(orchestrator.run(&request()).is_success());
    }

    #[test]
    fn test_restart_failure_is_not_fatal() {
        struct BrokenLauncher;
        impl Launcher for BrokenLauncher {
            fn launch(&self, _: &Path, _: &[String], _: LaunchMode) -> io::Result<ProcessHandle> {
                Err(io::Error::from(io::ErrorKind::NotFound))
            }
        }

        let harness = Harness::new(MemoryStore::default());
        let orchestrator = Orchestrator::new(
            Box::new(NoProcesses),
            Box::new(FixedInstaller(InstallOutcome::Success)),
            Box::new(Arc::clone(&harness.store)),
            Box::new(Arc::clone(&harness.reporter)),
            Box::new(BrokenLauncher),
        );

        let report = orchestrator.run(&request());
        assert!(report.is_success());
        assert!(!report.restarted);
        assert!(matches!(report.restart_error, Some(UpdateError::Restart { .. })));
    }
}
