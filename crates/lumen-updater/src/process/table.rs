//! Operating system process table.

use std::io;

/// A running process as seen in the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    /// Process ID.
    pub pid: u32,
    /// Executable file name (no directory).
    pub name: String,
}

impl ProcessEntry {
    /// Create an entry.
    #[must_use]
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }
}

/// Result of a single termination attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// The signal was delivered.
    Killed,
    /// The process exited before it could be killed.
    AlreadyGone,
}

/// Enumerate and forcefully terminate processes.
pub trait ProcessTable: Send + Sync {
    /// Snapshot of running processes.
    ///
    /// # Errors
    ///
    /// Returns an error when the process table cannot be read at all.
    fn list(&self) -> io::Result<Vec<ProcessEntry>>;

    /// Forcefully terminate `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error when the process exists but cannot be killed.
    fn kill(&self, pid: u32) -> io::Result<KillOutcome>;
}

/// Compare executable names the way the host file system does.
#[must_use]
pub fn names_match(candidate: &str, wanted: &str) -> bool {
    if cfg!(windows) {
        candidate.eq_ignore_ascii_case(wanted)
    } else {
        candidate == wanted
    }
}

/// Process table of the running system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn list(&self) -> io::Result<Vec<ProcessEntry>> {
        imp::list()
    }

    fn kill(&self, pid: u32) -> io::Result<KillOutcome> {
        imp::kill(pid)
    }
}

/// Final path component, accepting both separators.
#[cfg_attr(windows, allow(dead_code))]
fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(unix)]
fn kill_unix(pid: u32) -> io::Result<KillOutcome> {
    let target = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid pid {pid}")))?;
    if target <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to signal pid {pid}"),
        ));
    }

    #[allow(unsafe_code)]
    // SAFETY: kill(2) has no memory-safety preconditions; target is a positive pid.
    let result = unsafe { libc::kill(target, libc::SIGKILL) };
    if result == 0 {
        return Ok(KillOutcome::Killed);
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => Ok(KillOutcome::AlreadyGone),
        _ => Err(err),
    }
}

#[cfg(target_os = "linux")]
mod imp {
    use std::fs;
    use std::io;
    use std::path::Path;

    use super::{KillOutcome, ProcessEntry, basename};

    pub(super) fn list() -> io::Result<Vec<ProcessEntry>> {
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir("/proc")? {
            let Ok(dir_entry) = dir_entry else { continue };
            let Some(pid) = dir_entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };
            let proc_dir = dir_entry.path();
            if is_zombie(&proc_dir) {
                continue;
            }
            if let Some(name) = executable_name(&proc_dir) {
                entries.push(ProcessEntry::new(pid, name));
            }
        }
        Ok(entries)
    }

    pub(super) fn kill(pid: u32) -> io::Result<KillOutcome> {
        super::kill_unix(pid)
    }

    /// Name from `exe`, falling back to `cmdline` and `comm` for processes
    /// owned by other users.
    fn executable_name(proc_dir: &Path) -> Option<String> {
        if let Ok(target) = fs::read_link(proc_dir.join("exe")) {
            let lossy = target.to_string_lossy();
            // The running image of a replaced binary shows up as "name (deleted)".
            let raw = lossy.strip_suffix(" (deleted)").unwrap_or(&*lossy);
            let name = basename(raw);
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }

        if let Ok(cmdline) = fs::read(proc_dir.join("cmdline")) {
            if let Some(first) = cmdline.split(|b| *b == 0).next().filter(|a| !a.is_empty()) {
                let arg0 = String::from_utf8_lossy(first);
                let name = basename(&arg0);
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }

        fs::read_to_string(proc_dir.join("comm"))
            .ok()
            .map(|comm| comm.trim_end().to_string())
            .filter(|comm| !comm.is_empty())
    }

    /// Zombies stay in the table until reaped and cannot be killed again.
    fn is_zombie(proc_dir: &Path) -> bool {
        fs::read_to_string(proc_dir.join("stat"))
            .ok()
            .and_then(|stat| {
                let (_, rest) = stat.rsplit_once(')')?;
                rest.trim_start().chars().next()
            })
            .is_some_and(|state| matches!(state, 'Z' | 'X'))
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
mod imp {
    use std::io;
    use std::process::Command;

    use super::{KillOutcome, ProcessEntry, basename};

    pub(super) fn list() -> io::Result<Vec<ProcessEntry>> {
        let output = Command::new("ps").args(["-axo", "pid=,stat=,comm="]).output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "ps exited with {}",
                output.status
            )));
        }
        Ok(parse_ps(&String::from_utf8_lossy(&output.stdout)))
    }

    pub(super) fn kill(pid: u32) -> io::Result<KillOutcome> {
        super::kill_unix(pid)
    }

    fn parse_ps(output: &str) -> Vec<ProcessEntry> {
        output
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let pid = fields.next()?.parse().ok()?;
                let stat = fields.next()?;
                if stat.starts_with('Z') {
                    return None;
                }
                let comm = fields.collect::<Vec<_>>().join(" ");
                let name = basename(&comm);
                (!name.is_empty()).then(|| ProcessEntry::new(pid, name))
            })
            .collect()
    }

}

#[cfg(windows)]
mod imp {
    use std::io;
    use std::os::windows::process::CommandExt;
    use std::process::Command;

    use super::{KillOutcome, ProcessEntry};

    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    pub(super) fn list() -> io::Result<Vec<ProcessEntry>> {
        let output = Command::new("tasklist")
            .args(["/FO", "CSV", "/NH"])
            .creation_flags(CREATE_NO_WINDOW)
            .output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "tasklist exited with {}",
                output.status
            )));
        }
        Ok(parse_tasklist(&String::from_utf8_lossy(&output.stdout)))
    }

    pub(super) fn kill(pid: u32) -> io::Result<KillOutcome> {
        let output = Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .creation_flags(CREATE_NO_WINDOW)
            .output()?;
        if output.status.success() {
            return Ok(KillOutcome::Killed);
        }
        if list()?.iter().all(|entry| entry.pid != pid) {
            return Ok(KillOutcome::AlreadyGone);
        }
        Err(io::Error::other(format!(
            "taskkill /PID {pid} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }

    /// Parse `"Image Name","PID","Session Name","Session#","Mem Usage"` rows.
    pub(super) fn parse_tasklist(output: &str) -> Vec<ProcessEntry> {
        output
            .lines()
            .filter_map(|line| {
                let line = line.trim().strip_prefix('"')?.strip_suffix('"')?;
                let mut fields = line.split("\",\"");
                let name = fields.next()?;
                let pid = fields.next()?.parse().ok()?;
                Some(ProcessEntry::new(pid, name))
            })
            .collect()
    }

}
