//! Change detection inside marker directories.
//!
//! [`find_new_or_changed`] lists the immediate children of a marker
//! directory and keeps the files whose modification time is newer than what
//! the registrar recorded. It never mutates the registrar; the collector
//! records a file only after its content has been read.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use lb_core::{CandidateFile, ScanTarget};
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::registrar::RegistrarStore;

/// Decides whether a file must be collected.
///
/// A file is selected when it was never collected, or when its modification
/// time is strictly after the recorded one. Equal times count as collected,
/// so polling an unchanged file never re-sends it.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use lb_scanner::needs_collection;
///
/// let t = Utc::now();
/// assert!(needs_collection(None, t));
/// assert!(!needs_collection(Some(t), t));
/// assert!(needs_collection(Some(t), t + Duration::seconds(1)));
/// ```
#[inline]
#[must_use]
pub fn needs_collection(last_collected: Option<DateTime<Utc>>, modified: DateTime<Utc>) -> bool {
    last_collected.is_none_or(|last| modified > last)
}

/// Returns `true` if `filename` has exactly the extension `extension`
/// (case-sensitive, given without the leading dot).
#[inline]
#[must_use]
pub fn has_extension(filename: &str, extension: &str) -> bool {
    Utf8Path::new(filename).extension() == Some(extension)
}

/// Lists the files in `target` that need collection.
///
/// Only immediate children are considered. Regular files and symbolic links
/// to regular files qualify; directories never do. A file whose metadata
/// cannot be read is skipped with a warning. Results are sorted by file
/// name.
///
/// # Errors
///
/// Returns [`ScanError::ReadDir`] if the directory itself cannot be listed.
pub fn find_new_or_changed(
    target: &ScanTarget,
    extension: &str,
    registrar: &RegistrarStore,
) -> Result<Vec<CandidateFile>, ScanError> {
    let mut selected = Vec::new();
    let walker = WalkDir::new(&target.path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            // The directory itself failed; nothing below it can be trusted.
            Err(e) if e.depth() == 0 => return Err(ScanError::read_dir(&target.path, e)),
            Err(e) => {
                tracing::warn!(dir = %target.path, error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        let Some(filename) = entry.file_name().to_str() else {
            tracing::warn!(path = %entry.path().display(), "Skipping non-UTF-8 file name");
            continue;
        };
        if !has_extension(filename, extension) {
            continue;
        }

        let path = target.path.join(filename);
        let Some(modified) = file_modified(&path) else {
            continue;
        };

        let last = registrar.lookup(&target.path, filename);
        if needs_collection(last, modified) {
            tracing::debug!(path = %path, %modified, previous = ?last, "File is new or modified");
            selected.push(CandidateFile::new(target.path.clone(), filename, modified));
        } else {
            tracing::trace!(path = %path, "File unchanged");
        }
    }

    Ok(selected)
}

/// Modification time of a regular file, following symbolic links.
///
/// Returns `None` (after logging) for anything that is not a readable
/// regular file.
fn file_modified(path: &Utf8Path) -> Option<DateTime<Utc>> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Cannot stat file, skipping");
            return None;
        }
    };
    if !metadata.is_file() {
        return None;
    }
    match metadata.modified() {
        Ok(modified) => Some(DateTime::<Utc>::from(modified)),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "No modification time, skipping");
            None
        }
    }
}
