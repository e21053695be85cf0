//! Persistent record of collected files.
//!
//! This module provides [`RegistrarStore`], the durable map of
//! `(directory, filename) -> last collected timestamp` the agent consults to
//! decide whether a file has already been shipped.
//!
//! # File Format
//!
//! ```json
//! [
//!   {
//!     "path": "/data/job-1/list",
//!     "files": [
//!       { "filename": "a.list", "collected_time": "2024-03-01T08:00:00Z" }
//!     ]
//!   }
//! ]
//! ```
//!
//! Order of records and files is insignificant. Timestamps with a non-UTC
//! offset are accepted and normalised to UTC.
//!
//! # Failure Policy
//!
//! - A missing or malformed file loads as an empty store (first run, or
//!   corrupted state, starts clean)
//! - [`flush`](RegistrarStore::flush) logs and swallows write failures; the
//!   in-memory state stays authoritative and the next flush retries
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8Path;
//! use chrono::Utc;
//! use lb_scanner::RegistrarStore;
//!
//! let mut store = RegistrarStore::load("./data/registrar/registrar-list.json");
//! let dir = Utf8Path::new("/data/job-1/list");
//!
//! if store.lookup(dir, "a.list").is_none() {
//!     store.record(dir, "a.list", Utc::now());
//! }
//! store.flush();
//! ```

use std::collections::BTreeMap;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::ScanError;

/// Composite key of one registrar entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrarKey {
    /// Marker directory holding the file.
    pub dir: Utf8PathBuf,
    /// File name within `dir`.
    pub filename: String,
}

impl RegistrarKey {
    /// Creates a key from a directory and file name.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            filename: filename.into(),
        }
    }
}

/// One directory's worth of entries, as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarRecord {
    /// Marker directory path.
    pub path: Utf8PathBuf,
    /// Files collected from that directory.
    pub files: Vec<RegistrarFile>,
}

/// One collected file, as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarFile {
    /// File name.
    pub filename: String,
    /// Timestamp of the collected revision.
    pub collected_time: DateTime<Utc>,
}

/// In-memory registrar mirrored to a JSON file.
///
/// Owned by a single scheduler; not shared between threads. Mutations only
/// set a dirty flag, and [`flush`](Self::flush) writes the whole map back
/// when that flag is set.
#[derive(Debug, Clone)]
pub struct RegistrarStore {
    /// Backing file.
    path: Utf8PathBuf,
    /// `(dir, filename) -> timestamp`.
    entries: FxHashMap<RegistrarKey, DateTime<Utc>>,
    /// Set when `entries` differs from the last successful save.
    dirty: bool,
}

impl RegistrarStore {
    /// Creates an empty store backed by `path`, without touching the disk.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: FxHashMap::default(),
            dirty: false,
        }
    }

    /// Loads the store from `path`.
    ///
    /// Never fails: an unreadable, absent or malformed file yields an empty
    /// store backed by the same path.
    pub fn load(path: impl Into<Utf8PathBuf>) -> Self {
        let mut store = Self::new(path);

        let content = match std::fs::read(&store.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %store.path, "No registrar yet, starting empty");
                return store;
            }
            Err(e) => {
                tracing::warn!(path = %store.path, error = %e, "Cannot read registrar, starting empty");
                return store;
            }
        };

        // Older writers emit `null` for an empty registrar.
        match serde_json::from_slice::<Option<Vec<RegistrarRecord>>>(&content) {
            Ok(records) => {
                for record in records.unwrap_or_default() {
                    for file in record.files {
                        store.entries.insert(
                            RegistrarKey::new(record.path.clone(), file.filename),
                            file.collected_time,
                        );
                    }
                }
                tracing::debug!(path = %store.path, entries = store.entries.len(), "Registrar loaded");
            }
            Err(e) => {
                tracing::warn!(path = %store.path, error = %e, "Malformed registrar, starting empty");
            }
        }

        store
    }

    /// Returns the last collected timestamp of a file, if any.
    #[must_use]
    pub fn lookup(&self, dir: &Utf8Path, filename: &str) -> Option<DateTime<Utc>> {
        self.entries
            .get(&RegistrarKey::new(dir, filename))
            .copied()
    }

    /// Inserts or overwrites an entry.
    ///
    /// Recording the timestamp already stored is a no-op and leaves the
    /// store clean.
    pub fn record(&mut self, dir: &Utf8Path, filename: &str, timestamp: DateTime<Utc>) {
        let previous = self
            .entries
            .insert(RegistrarKey::new(dir, filename), timestamp);
        if previous != Some(timestamp) {
            self.dirty = true;
        }
    }

    /// Writes the full map to the backing file.
    ///
    /// Parent directories are created as needed. Content goes to a
    /// temporary file in the same directory which then replaces the
    /// registrar, so readers never see a partial file. On unix the file is
    /// left readable by everyone (`0644`).
    pub fn save(&self) -> Result<(), ScanError> {
        let mut json = serde_json::to_vec_pretty(&self.snapshot())?;
        json.push(b'\n');

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
            _ => Utf8PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| ScanError::persist(&self.path, e))?;

        let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| ScanError::persist(&self.path, e))?;
        tmp.write_all(&json)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| ScanError::persist(&self.path, e))?;

        // NamedTempFile creates 0600.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))
                .map_err(|e| ScanError::persist(&self.path, e))?;
        }

        tmp.persist(&self.path)
            .map_err(|e| ScanError::persist(&self.path, e.error))?;

        Ok(())
    }

    /// Saves the store if it changed since the last successful save.
    ///
    /// Returns `true` if a write happened and succeeded. Failures are logged
    /// and leave the store dirty so the next flush tries again.
    pub fn flush(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        match self.save() {
            Ok(()) => {
                self.dirty = false;
                tracing::debug!(path = %self.path, entries = self.entries.len(), "Registrar saved");
                true
            }
            Err(e) => {
                tracing::error!(path = %self.path, error = %e, "Failed to save registrar, keeping in-memory state");
                false
            }
        }
    }

    /// Groups entries by directory, sorted by path then file name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RegistrarRecord> {
        let mut by_dir: BTreeMap<&Utf8Path, Vec<RegistrarFile>> = BTreeMap::new();
        for (key, collected_time) in &self.entries {
            by_dir.entry(&key.dir).or_default().push(RegistrarFile {
                filename: key.filename.clone(),
                collected_time: *collected_time,
            });
        }

        by_dir
            .into_iter()
            .map(|(path, mut files)| {
                files.sort_by(|a, b| a.filename.cmp(&b.filename));
                RegistrarRecord {
                    path: path.to_owned(),
                    files,
                }
            })
            .collect()
    }

    /// The backing file.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns `true` if there are unsaved changes.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of `(dir, filename)` entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn temp_registrar(dir: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistrarStore::load(temp_registrar(&dir, "absent.json"));
        assert!(store.is_empty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_load_malformed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_registrar(&dir, "broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = RegistrarStore::load(&path);
        assert!(store.is_empty());
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn test_load_null_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_registrar(&dir, "null.json");
        std::fs::write(&path, "null\n").unwrap();
        assert!(RegistrarStore::load(&path).is_empty());
    }

    #[test]
    fn test_load_normalises_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_registrar(&dir, "offset.json");
        std::fs::write(
            &path,
            r#"[{"path":"/data/list","files":[{"filename":"a.list","collected_time":"2024-03-01T16:00:00.5+08:00"}]}]"#,
        )
        .unwrap();

        let store = RegistrarStore::load(&path);
        let expected = ts(8) + chrono::Duration::milliseconds(500);
        assert_eq!(store.lookup(Utf8Path::new("/data/list"), "a.list"), Some(expected));
    }

    #[test]
    fn test_lookup_unknown_filename_in_known_dir() {
        let mut store = RegistrarStore::new("unused.json");
        store.record(Utf8Path::new("/data/list"), "a.list", ts(1));
        assert_eq!(store.lookup(Utf8Path::new("/data/list"), "b.list"), None);
        assert_eq!(store.lookup(Utf8Path::new("/data/other"), "a.list"), None);
    }

    #[test]
    fn test_record_overwrites_and_marks_dirty() {
        let mut store = RegistrarStore::new("unused.json");
        let dir = Utf8Path::new("/data/list");

        store.record(dir, "a.list", ts(1));
        assert!(store.is_dirty());
        store.record(dir, "a.list", ts(2));
        assert_eq!(store.lookup(dir, "a.list"), Some(ts(2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_record_same_timestamp_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RegistrarStore::new(temp_registrar(&dir, "reg.json"));
        let marker = Utf8Path::new("/data/list");

        store.record(marker, "a.list", ts(1));
        assert!(store.flush());
        store.record(marker, "a.list", ts(1));
        assert!(!store.is_dirty());
        assert!(!store.flush());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_registrar(&dir, "nested/deeper/registrar-list.json");

        let mut store = RegistrarStore::new(&path);
        store.record(Utf8Path::new("/data/b/list"), "z.list", ts(3));
        store.record(Utf8Path::new("/data/a/list"), "y.list", ts(2));
        store.record(Utf8Path::new("/data/a/list"), "x.list", ts(1) + chrono::Duration::nanoseconds(7));
        assert!(store.flush());
        assert!(!store.is_dirty());

        let loaded = RegistrarStore::load(&path);
        assert_eq!(loaded.len(), 3);
        for record in store.snapshot() {
            for file in record.files {
                assert_eq!(
                    loaded.lookup(&record.path, &file.filename),
                    Some(file.collected_time)
                );
            }
        }
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let mut store = RegistrarStore::new("unused.json");
        store.record(Utf8Path::new("/b"), "2.log", ts(1));
        store.record(Utf8Path::new("/a"), "9.log", ts(1));
        store.record(Utf8Path::new("/b"), "1.log", ts(1));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].path.as_str(), "/a");
        let names: Vec<_> = snapshot[1].files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, ["1.log", "2.log"]);
    }

    #[test]
    fn test_flush_failure_keeps_state_dirty() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the registrar directory should be.
        let blocker = temp_registrar(&dir, "blocker");
        std::fs::write(&blocker, "").unwrap();

        let mut store = RegistrarStore::new(blocker.join("registrar-log.json"));
        store.record(Utf8Path::new("/data/LOG"), "a.log", ts(1));

        assert!(store.save().is_err_and(|e| e.is_persistence()));
        assert!(!store.flush());
        assert!(store.is_dirty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clean_store_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_registrar(&dir, "never.json");
        let mut store = RegistrarStore::new(&path);
        assert!(!store.flush());
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = temp_registrar(&dir, "registrar-list.json");
        let mut store = RegistrarStore::new(&path);
        store.record(Utf8Path::new("/data/a/list"), "x.list", ts(1));
        store.save().unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
