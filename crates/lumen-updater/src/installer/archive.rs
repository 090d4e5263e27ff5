//! Extract an archive and run the installer packaged inside it.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use super::extract::{archive_stem, detect_archive_type, extract_archive};
use super::{InstallOutcome, InstallerStrategy, ProgressMode, ensure_installer_exists};
use crate::error::{Result, UpdateError};
use crate::process;
use crate::status::{Progress, StatusReporter};

/// Share of the progress bar used by extraction; the rest covers the installer run.
const EXTRACT_SHARE: u8 = 50;
/// Progress never reaches 100% before the installer exits.
const RUN_CEILING: u8 = 99;

/// Extracts the archive beside itself, then runs a known installer from it,
/// polling until it exits.
///
/// Extracted files are left in place after both success and failure.
#[derive(Debug, Clone)]
pub struct ArchiveRun {
    installer_name: PathBuf,
    args: Vec<String>,
    poll_interval: Duration,
}

impl ArchiveRun {
    /// Strategy running `installer_name` (relative to the extraction root) with `args`.
    #[must_use]
    pub fn new(installer_name: PathBuf, args: Vec<String>, poll_interval: Duration) -> Self {
        Self {
            installer_name,
            args,
            poll_interval,
        }
    }

    /// Directory the archive at `archive` is extracted into.
    pub fn working_dir(archive: &Path) -> Result<PathBuf> {
        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                UpdateError::ArchiveExtraction(format!(
                    "invalid archive path {}",
                    archive.display()
                ))
            })?;
        let kind = detect_archive_type(file_name).ok_or_else(|| {
            UpdateError::ArchiveExtraction(format!("unsupported archive type: {file_name}"))
        })?;
        Ok(archive.with_file_name(format!("{}.extract", archive_stem(file_name, kind))))
    }

    fn wait_for_installer(
        &self,
        child: &mut std::process::Child,
        reporter: &dyn StatusReporter,
    ) -> Result<Option<i32>> {
        let mut percent = EXTRACT_SHARE;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status.code()),
                Ok(None) => {
                    percent = next_run_tick(percent);
                    reporter.progress(Progress::percent(percent));
                    thread::sleep(self.poll_interval);
                }
                Err(e) => {
                    return Err(UpdateError::Io(format!(
                        "failed to poll installer process: {e}"
                    )));
                }
            }
        }
    }
}

/// Creep toward the ceiling without reaching it.
fn next_run_tick(percent: u8) -> u8 {
    let remaining = RUN_CEILING.saturating_sub(percent);
    percent.saturating_add((remaining / 10).max(1)).min(RUN_CEILING)
}

fn extraction_tick(done: usize, total: usize) -> u8 {
    if total == 0 {
        return EXTRACT_SHARE;
    }
    let scaled = done.min(total) * usize::from(EXTRACT_SHARE) / total;
    u8::try_from(scaled).unwrap_or(EXTRACT_SHARE)
}

impl InstallerStrategy for ArchiveRun {
    fn name(&self) -> &'static str {
        "archive"
    }

    fn progress_mode(&self) -> ProgressMode {
        ProgressMode::Determinate
    }

    fn install(&self, installer: &Path, reporter: &dyn StatusReporter) -> Result<InstallOutcome> {
        ensure_installer_exists(installer)?;
        let file_name = installer
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let kind = detect_archive_type(file_name).ok_or_else(|| {
            UpdateError::ArchiveExtraction(format!("unsupported archive type: {file_name}"))
        })?;
        let work_dir = Self::working_dir(installer)?;

        tracing::info!(
            target: "update.install",
            archive = %installer.display(),
            kind = %kind,
            dest = %work_dir.display(),
            "Extracting installer archive"
        );
        reporter.progress(Progress::percent(0));
        let entries = extract_archive(kind, installer, &work_dir, &mut |done, total| {
            reporter.progress(Progress::percent(extraction_tick(done, total)));
        })?;
        tracing::debug!(target: "update.install", entries, "Archive extracted");

        let target = work_dir.join(&self.installer_name);
        if !target.is_file() {
            return Err(UpdateError::InstallerMissing(target));
        }

        tracing::info!(
            target: "update.install",
            installer = %target.display(),
            args = ?self.args,
            "Running extracted installer"
        );
        let mut child =
            process::spawn(&target, &self.args).map_err(|source| UpdateError::InstallerLaunch {
                path: target.clone(),
                source,
            })?;
        let code = self.wait_for_installer(&mut child, reporter)?;

        tracing::info!(target: "update.install", exit_code = ?code, "Extracted installer finished");
        let outcome = InstallOutcome::from_exit_code(code);
        if outcome.is_success() {
            reporter.progress(Progress::percent(100));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::extract::tests::{build_tar_gz, build_zip};
    use crate::status::{RecordingReporter, StatusEvent};
    use tempfile::TempDir;

    fn percents(reporter: &RecordingReporter) -> Vec<u8> {
        reporter
            .events()
            .into_iter()
            .filter_map(|event| match event {
                StatusEvent::Progress {
                    progress: Progress::Percent(p),
                } => Some(p),
                _ => None,
            })
            .collect()
    }

    fn strategy() -> ArchiveRun {
        ArchiveRun::new(
            PathBuf::from("bin/setup"),
            vec!["/S".to_string()],
            Duration::from_millis(10),
        )
    }

    #[test]
    fn test_working_dir() {
        assert_eq!(
            ArchiveRun::working_dir(Path::new("/tmp/lumen-1.93.tar.gz")).unwrap(),
            PathBuf::from("/tmp/lumen-1.93.extract")
        );
        assert!(ArchiveRun::working_dir(Path::new("/tmp/setup.exe")).is_err());
    }

    #[test]
    fn test_run_ticks_stay_below_ceiling() {
        let mut percent = EXTRACT_SHARE;
        for _ in 0..200 {
            let next = next_run_tick(percent);
            assert!(next >= percent);
            percent = next;
        }
        assert_eq!(percent, RUN_CEILING);
        assert_eq!(extraction_tick(1, 2), 25);
        assert_eq!(extraction_tick(0, 0), EXTRACT_SHARE);
    }

    #[test]
    fn test_missing_installer_in_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("update.zip");
        build_zip(&archive, &[("readme.txt", "no installer here", 0o644)]);

        let err = strategy()
            .install(&archive, &RecordingReporter::new())
            .unwrap_err();
        assert!(matches!(err, UpdateError::InstallerMissing(_)));
        // Extracted content is kept for inspection.
        assert!(dir.path().join("update.extract/readme.txt").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_extracted_installer() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("update.tar.gz");
        build_tar_gz(
            &archive,
            &[("bin/setup", "#!/bin/sh\nsleep 0.1\n[ \"$1\" = /S ] || exit 4\nexit 0\n", 0o755)],
        );

        let reporter = RecordingReporter::new();
        let outcome = strategy().install(&archive, &reporter).unwrap();

        assert_eq!(outcome, InstallOutcome::Success);
        let ticks = percents(&reporter);
        assert_eq!(ticks.first(), Some(&0));
        assert_eq!(ticks.last(), Some(&100));
        assert!(ticks.iter().any(|p| *p > EXTRACT_SHARE && *p < 100));
    }

    #[cfg(unix)]
    #[test]
    fn test_extracted_installer_failure() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("update.zip");
        build_zip(&archive, &[("bin/setup", "#!/bin/sh\nexit 3\n", 0o755)]);

        let reporter = RecordingReporter::new();
        let outcome = strategy().install(&archive, &reporter).unwrap();

        assert_eq!(outcome, InstallOutcome::from_exit_code(Some(3)));
        assert!(percents(&reporter).iter().all(|p| *p < 100));
    }
}
