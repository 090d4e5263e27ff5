//! Process control: terminating the running application and launching children.

mod launch;
mod table;

pub use launch::{
    ExitReport, LaunchMode, Launcher, ProcessHandle, SystemLauncher, launch, run, spawn,
    spawn_detached,
};
pub use table::{KillOutcome, ProcessEntry, ProcessTable, SystemProcessTable, names_match};

use std::thread;

use crate::config::TerminationConfig;
use crate::error::{Result, UpdateError};

/// Terminates every running instance of an executable.
pub trait Terminate: Send + Sync {
    /// Forcefully terminate all processes whose executable file name is
    /// exactly `process_name`, returning how many were killed.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Termination`] when matches survive every pass,
    /// or [`UpdateError::Io`] when the process table cannot be read.
    fn terminate(&self, process_name: &str) -> Result<usize>;
}

/// Finds processes by exact executable name and kills them.
///
/// The updater's own PID is never a match. Processes that exit between
/// enumeration and the kill are not errors.
#[derive(Debug, Clone)]
pub struct ProcessController<T = SystemProcessTable> {
    table: T,
    retry: TerminationConfig,
    own_pid: u32,
}

impl ProcessController<SystemProcessTable> {
    /// Controller for the running system.
    #[must_use]
    pub fn system(retry: TerminationConfig) -> Self {
        Self::new(SystemProcessTable, retry)
    }
}

impl<T: ProcessTable> ProcessController<T> {
    /// Controller over an arbitrary process table.
    #[must_use]
    pub fn new(table: T, retry: TerminationConfig) -> Self {
        Self {
            table,
            retry,
            own_pid: std::process::id(),
        }
    }

    /// Treat `pid` as the updater's own process.
    #[must_use]
    pub fn with_own_pid(mut self, pid: u32) -> Self {
        self.own_pid = pid;
        self
    }

    /// Running processes named `process_name`, excluding the updater.
    fn matching(&self, process_name: &str) -> Result<Vec<ProcessEntry>> {
        let entries = self
            .table
            .list()
            .map_err(|e| UpdateError::Io(format!("failed to list processes: {e}")))?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.pid != self.own_pid && names_match(&entry.name, process_name))
            .collect())
    }
}

impl<T: ProcessTable> Terminate for ProcessController<T> {
    fn terminate(&self, process_name: &str) -> Result<usize> {
        let mut terminated = 0;
        let mut matches = self.matching(process_name)?;
        if matches.is_empty() {
            tracing::info!(target: "update.terminate", process = process_name, "No running instances found");
            return Ok(0);
        }

        let mut pass = 0;
        while !matches.is_empty() {
            if pass > self.retry.retries {
                return Err(UpdateError::Termination {
                    name: process_name.to_string(),
                    survivors: matches.len(),
                });
            }

            for entry in &matches {
                match self.table.kill(entry.pid) {
                    Ok(KillOutcome::Killed) => {
                        terminated += 1;
                        tracing::info!(
                            target: "update.terminate",
                            pid = entry.pid,
                            process = %entry.name,
                            "Terminated process"
                        );
                    }
                    Ok(KillOutcome::AlreadyGone) => {
                        tracing::debug!(
                            target: "update.terminate",
                            pid = entry.pid,
                            "Process exited before it could be terminated"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            target: "update.terminate",
                            pid = entry.pid,
                            error = %e,
                            "Failed to terminate process"
                        );
                    }
                }
            }

            pass += 1;
            let delay = self.retry.retry_delay();
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            matches = self.matching(process_name)?;
        }

        Ok(terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    /// Table whose entries disappear when killed, unless marked stubborn.
    struct FakeTable {
        entries: Mutex<Vec<ProcessEntry>>,
        stubborn: Vec<u32>,
        vanish_before_kill: Vec<u32>,
        kills: Mutex<Vec<u32>>,
    }

    impl FakeTable {
        fn new(entries: Vec<ProcessEntry>) -> Self {
            Self {
                entries: Mutex::new(entries),
                stubborn: Vec::new(),
                vanish_before_kill: Vec::new(),
                kills: Mutex::new(Vec::new()),
            }
        }
    }

    impl ProcessTable for FakeTable {
        fn list(&self) -> io::Result<Vec<ProcessEntry>> {
            Ok(self.entries.lock().unwrap().clone())
        }

        fn kill(&self, pid: u32) -> io::Result<KillOutcome> {
            self.kills.lock().unwrap().push(pid);
            let mut entries = self.entries.lock().unwrap();
            if self.vanish_before_kill.contains(&pid) {
                entries.retain(|e| e.pid != pid);
                return Ok(KillOutcome::AlreadyGone);
            }
            if self.stubborn.contains(&pid) {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            entries.retain(|e| e.pid != pid);
            Ok(KillOutcome::Killed)
        }
    }

    fn no_delay(retries: u32) -> TerminationConfig {
        TerminationConfig {
            retries,
            retry_delay_ms: 0,
        }
    }

    #[test]
    fn test_terminates_exact_matches_only() {
        let table = FakeTable::new(vec![
            ProcessEntry::new(10, "App.exe"),
            ProcessEntry::new(11, "App.exe"),
            ProcessEntry::new(12, "MyApp.exe"),
            ProcessEntry::new(13, "App.exe.old"),
        ]);
        let controller = ProcessController::new(table, no_delay(0)).with_own_pid(1);

        assert_eq!(controller.terminate("App.exe").unwrap(), 2);
        assert_eq!(*controller.table.kills.lock().unwrap(), vec![10, 11]);
    }

    #[test]
    fn test_zero_matches_is_not_an_error() {
        let controller = ProcessController::new(FakeTable::new(Vec::new()), no_delay(0));
        assert_eq!(controller.terminate("App.exe").unwrap(), 0);
    }

    #[test]
    fn test_never_kills_own_pid() {
        let table = FakeTable::new(vec![
            ProcessEntry::new(7, "lumen"),
            ProcessEntry::new(8, "lumen"),
        ]);
        let controller = ProcessController::new(table, no_delay(0)).with_own_pid(7);

        assert_eq!(controller.terminate("lumen").unwrap(), 1);
        assert_eq!(*controller.table.kills.lock().unwrap(), vec![8]);
    }

    #[test]
    fn test_process_exiting_mid_termination_is_tolerated() {
        let mut table = FakeTable::new(vec![
            ProcessEntry::new(20, "lumen"),
            ProcessEntry::new(21, "lumen"),
        ]);
        table.vanish_before_kill = vec![20];
        let controller = ProcessController::new(table, no_delay(0)).with_own_pid(1);

        assert_eq!(controller.terminate("lumen").unwrap(), 1);
    }

    #[test]
    fn test_survivors_after_retries() {
        let mut table = FakeTable::new(vec![ProcessEntry::new(30, "lumen")]);
        table.stubborn = vec![30];
        let controller = ProcessController::new(table, no_delay(2)).with_own_pid(1);

        let err = controller.terminate("lumen").unwrap_err();
        assert!(matches!(err, UpdateError::Termination { survivors: 1, .. }));
        assert_eq!(controller.table.kills.lock().unwrap().len(), 3);
    }
}
