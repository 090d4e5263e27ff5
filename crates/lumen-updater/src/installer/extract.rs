//! Archive extraction for packaged installers.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::{Result, UpdateError};

/// Archive type for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    /// tar.gz archive
    TarGz,
    /// ZIP archive
    Zip,
}

impl ArchiveType {
    /// Get a human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "ZIP",
        }
    }

    /// File name suffixes recognized for this type.
    const fn suffixes(&self) -> &'static [&'static str] {
        match self {
            Self::TarGz => &[".tar.gz", ".tgz"],
            Self::Zip => &[".zip"],
        }
    }
}

impl std::fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Detects the archive type from the file name.
#[must_use]
pub fn detect_archive_type(file_name: &str) -> Option<ArchiveType> {
    [ArchiveType::TarGz, ArchiveType::Zip]
        .into_iter()
        .find(|kind| kind.suffixes().iter().any(|s| strip_suffix_ignore_case(file_name, s).is_some()))
}

/// File name without its archive suffix (`update.tar.gz` -> `update`).
#[must_use]
pub(crate) fn archive_stem(file_name: &str, kind: ArchiveType) -> &str {
    kind.suffixes()
        .iter()
        .find_map(|s| strip_suffix_ignore_case(file_name, s))
        .unwrap_or(file_name)
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    let tail = name.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &name[..split])
}

/// Extracts `archive` into `dest`, calling `on_entry(done, total)` after each entry.
///
/// Entries whose paths would escape `dest` are skipped.
///
/// # Errors
///
/// Returns [`UpdateError::ArchiveExtraction`] if the archive cannot be read
/// or an entry cannot be written.
pub fn extract_archive(
    kind: ArchiveType,
    archive: &Path,
    dest: &Path,
    on_entry: &mut dyn FnMut(usize, usize),
) -> Result<usize> {
    fs::create_dir_all(dest).map_err(|e| {
        UpdateError::ArchiveExtraction(format!("Failed to create {}: {}", dest.display(), e))
    })?;

    match kind {
        ArchiveType::TarGz => extract_tar_gz(archive, dest, on_entry),
        ArchiveType::Zip => extract_zip(archive, dest, on_entry),
    }
}

fn open(archive: &Path) -> Result<BufReader<File>> {
    File::open(archive).map(BufReader::new).map_err(|e| {
        UpdateError::ArchiveExtraction(format!("Failed to open {}: {}", archive.display(), e))
    })
}

fn tar_entries(archive: &Path) -> Result<Archive<GzDecoder<BufReader<File>>>> {
    Ok(Archive::new(GzDecoder::new(open(archive)?)))
}

/// Extracts every entry of a tar.gz archive.
fn extract_tar_gz(
    archive: &Path,
    dest: &Path,
    on_entry: &mut dyn FnMut(usize, usize),
) -> Result<usize> {
    tracing::debug!("Extracting tar.gz archive {:?}", archive);

    // First pass only counts entries so progress has a denominator.
    let total = tar_entries(archive)?
        .entries()
        .map_err(|e| UpdateError::ArchiveExtraction(format!("Failed to read tar entries: {}", e)))?
        .count();

    let mut tar = tar_entries(archive)?;
    let mut done = 0;
    for entry_result in tar
        .entries()
        .map_err(|e| UpdateError::ArchiveExtraction(format!("Failed to read tar entries: {}", e)))?
    {
        let mut entry = entry_result.map_err(|e| {
            UpdateError::ArchiveExtraction(format!("Failed to read tar entry: {}", e))
        })?;

        let unpacked = entry.unpack_in(dest).map_err(|e| {
            UpdateError::ArchiveExtraction(format!("Failed to extract tar entry: {}", e))
        })?;
        if !unpacked {
            tracing::warn!(
                "Skipped archive entry outside the extraction directory: {:?}",
                entry.path().map(|p| p.into_owned()).unwrap_or_default()
            );
        }

        done += 1;
        on_entry(done, total);
    }

    Ok(done)
}

/// Extracts every entry of a ZIP archive.
fn extract_zip(
    archive: &Path,
    dest: &Path,
    on_entry: &mut dyn FnMut(usize, usize),
) -> Result<usize> {
    tracing::debug!("Extracting ZIP archive {:?}", archive);

    let mut zip = zip::ZipArchive::new(open(archive)?)?;
    let total = zip.len();

    for i in 0..total {
        let mut file = zip.by_index(i)?;
        let Some(relative) = file.enclosed_name() else {
            tracing::warn!(
                "Skipped archive entry outside the extraction directory: {}",
                file.name()
            );
            on_entry(i + 1, total);
            continue;
        };
        let dest_path = dest.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&dest_path).map_err(|e| {
                UpdateError::ArchiveExtraction(format!("Failed to create directory: {}", e))
            })?;
        } else {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    UpdateError::ArchiveExtraction(format!("Failed to create directory: {}", e))
                })?;
            }
            let mut out = File::create(&dest_path).map_err(|e| {
                UpdateError::ArchiveExtraction(format!("Failed to create {:?}: {}", dest_path, e))
            })?;
            io::copy(&mut file, &mut out).map_err(|e| {
                UpdateError::ArchiveExtraction(format!("Failed to write {:?}: {}", dest_path, e))
            })?;

            // Make executable on Unix
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = file.unix_mode() {
                    let perms = fs::Permissions::from_mode(mode & 0o777);
                    fs::set_permissions(&dest_path, perms).map_err(|e| {
                        UpdateError::ArchiveExtraction(format!("Failed to set permissions: {}", e))
                    })?;
                }
            }
        }

        on_entry(i + 1, total);
    }

    Ok(total)
}
