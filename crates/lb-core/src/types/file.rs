//! Files selected for collection.
//!
//! [`CandidateFile`] is the metadata the change detector produces;
//! [`CollectibleFile`] adds the content once the collector has read it.
//! Neither is persisted: only the modification time survives, in the
//! registrar.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};

/// A file that is new or modified since it was last collected.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use lb_core::CandidateFile;
///
/// let file = CandidateFile::new("/data/list", "a.list", Utc::now());
/// assert_eq!(file.full_path().as_str(), "/data/list/a.list");
/// assert_eq!(file.dir().as_str(), "/data/list");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateFile {
    /// Marker directory holding the file.
    pub dir: Utf8PathBuf,

    /// File name within `dir`.
    pub filename: String,

    /// Filesystem modification time observed by the detector.
    pub modified: DateTime<Utc>,
}

impl CandidateFile {
    /// Creates a new candidate.
    #[must_use]
    pub fn new(
        dir: impl Into<Utf8PathBuf>,
        filename: impl Into<String>,
        modified: DateTime<Utc>,
    ) -> Self {
        Self {
            dir: dir.into(),
            filename: filename.into(),
            modified,
        }
    }

    /// Path of the file itself.
    #[must_use]
    pub fn full_path(&self) -> Utf8PathBuf {
        self.dir.join(&self.filename)
    }

    /// The containing directory.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }
}

/// A candidate file together with its full content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectibleFile {
    /// Location and modification time.
    pub file: CandidateFile,

    /// Raw file bytes.
    pub content: Vec<u8>,
}

impl CollectibleFile {
    /// Pairs a candidate with the bytes read from it.
    #[must_use]
    pub const fn new(file: CandidateFile, content: Vec<u8>) -> Self {
        Self { file, content }
    }
}
