//! In-process zip extraction.
//!
//! The central directory is inspected before any byte is written: unsafe
//! entry names, symlinks, too many files, and oversized declared content are
//! all refused up front. Declared sizes can lie, so the bytes actually written
//! are bounded again while streaming.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{GateError, LimitKind, Result};
use crate::verify::VerificationLimits;

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// What extraction wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

pub(crate) fn symlink_error() -> GateError {
    GateError::LimitExceeded {
        kind: LimitKind::Symlink,
        detail: "Symlinks are not allowed".to_string(),
    }
}

pub(crate) fn size_error(total: u64, max: u64) -> GateError {
    GateError::LimitExceeded {
        kind: LimitKind::ExtractedBytes,
        detail: format!("Extracted content exceeds size limit ({total} > {max} bytes)"),
    }
}

pub(crate) fn count_error(count: usize, max: usize) -> GateError {
    GateError::LimitExceeded {
        kind: LimitKind::FileCount,
        detail: format!("Extracted content exceeds file-count limit ({count} > {max} files)"),
    }
}

fn zip_error(err: ZipError) -> GateError {
    GateError::ExtractionFailed(err.to_string())
}

fn is_symlink(unix_mode: Option<u32>) -> bool {
    unix_mode.is_some_and(|mode| mode & S_IFMT == S_IFLNK)
}

struct PlannedEntry {
    index: usize,
    path: PathBuf,
    is_dir: bool,
}

/// Extract `archive` into `dest` (which must already exist).
pub fn extract_archive(
    archive: &Path,
    dest: &Path,
    limits: &VerificationLimits,
) -> Result<ExtractionStats> {
    let file = File::open(archive)
        .map_err(|err| GateError::ArchiveUnreadable(format!("{}: {err}", archive.display())))?;
    let mut zip = ZipArchive::new(BufReader::new(file))
        .map_err(|err| GateError::ArchiveUnreadable(format!("{}: {err}", archive.display())))?;

    let plan = inspect(&mut zip, limits)?;

    let mut stats = ExtractionStats::default();
    for planned in plan {
        let out_path = dest.join(&planned.path);
        if planned.is_dir {
            std::fs::create_dir_all(&out_path)?;
            stats.directories += 1;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut entry = zip.by_index(planned.index).map_err(zip_error)?;
        let remaining = limits.max_extracted_bytes.saturating_sub(stats.bytes);
        let mut out = File::create(&out_path)?;
        let written = std::io::copy(&mut (&mut entry).take(remaining.saturating_add(1)), &mut out)
            .map_err(|err| GateError::ExtractionFailed(format!("{}: {err}", planned.path.display())))?;
        out.flush()?;
        stats.bytes += written;
        if stats.bytes > limits.max_extracted_bytes {
            return Err(size_error(stats.bytes, limits.max_extracted_bytes));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode & 0o755))?;
            }
        }
        stats.files += 1;
    }

    debug!(
        archive = %archive.display(),
        files = stats.files,
        bytes = stats.bytes,
        "extracted archive"
    );
    Ok(stats)
}

fn inspect<R: Read + std::io::Seek>(
    zip: &mut ZipArchive<R>,
    limits: &VerificationLimits,
) -> Result<Vec<PlannedEntry>> {
    let mut plan = Vec::with_capacity(zip.len());
    let mut declared_bytes: u64 = 0;
    let mut file_count: usize = 0;

    for index in 0..zip.len() {
        let entry = zip.by_index_raw(index).map_err(zip_error)?;
        let Some(path) = entry.enclosed_name() else {
            return Err(GateError::ExtractionFailed(format!(
                "unsafe entry path: {}",
                entry.name()
            )));
        };
        if is_symlink(entry.unix_mode()) {
            return Err(symlink_error());
        }
        let is_dir = entry.is_dir();
        if !is_dir {
            file_count += 1;
            if file_count > limits.max_file_count {
                return Err(count_error(file_count, limits.max_file_count));
            }
            declared_bytes = declared_bytes.saturating_add(entry.size());
            if declared_bytes > limits.max_extracted_bytes {
                return Err(size_error(declared_bytes, limits.max_extracted_bytes));
            }
        }
        plan.push(PlannedEntry { index, path, is_dir });
    }
    Ok(plan)
}
