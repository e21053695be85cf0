//! Marker directories discovered by a scan.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use super::MarkerKind;

/// A concrete marker directory known to contain collectible files.
///
/// Produced by a full scan, revalidated by an existence check on every
/// cycle that does not rescan, and dropped once the directory is gone.
///
/// # Examples
///
/// ```
/// use lb_core::{MarkerKind, ScanTarget};
///
/// let target = ScanTarget::new("/data/job-1/list", MarkerKind::List);
/// assert_eq!(target.path().as_str(), "/data/job-1/list");
/// assert_eq!(target.extension(), "list");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanTarget {
    /// Absolute or root-relative path of the marker directory.
    pub path: Utf8PathBuf,

    /// Which marker this directory matched.
    pub kind: MarkerKind,
}

impl ScanTarget {
    /// Creates a new scan target.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, kind: MarkerKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// The directory path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// File extension collected from this directory.
    #[inline]
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        self.kind.extension()
    }
}
