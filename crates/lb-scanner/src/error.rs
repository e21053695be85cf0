//! Error types for the lb-scanner crate.
//!
//! This module provides the [`ScanError`] type for errors that can occur
//! while listing marker directories, reading collected files and persisting
//! the registrar.

use camino::Utf8PathBuf;

/// Errors that can occur during scanning, collection and persistence.
///
/// # Error Recovery Strategy
///
/// None of these errors stop the collection loop:
///
/// - **Directory listing** ([`ScanError::ReadDir`]): skip the directory for
///   this cycle, retry next cycle
/// - **File read** ([`ScanError::Read`]): skip the file, registrar untouched,
///   retry next cycle
/// - **Persistence** ([`ScanError::Persist`], [`ScanError::Serialize`]): keep
///   the in-memory state, retry at the next flush
///
/// # Examples
///
/// ```
/// use lb_scanner::ScanError;
///
/// fn handle_error(err: &ScanError) {
///     match err {
///         ScanError::ReadDir { path, .. } => eprintln!("Cannot list: {path}"),
///         ScanError::Read { path, .. } => eprintln!("Cannot read: {path}"),
///         ScanError::Persist { path, .. } => eprintln!("Cannot persist: {path}"),
///         ScanError::Serialize(e) => eprintln!("Cannot encode registrar: {e}"),
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Failed to list the entries of a directory.
    #[error("failed to list directory {path}: {source}")]
    ReadDir {
        /// The directory that couldn't be listed.
        path: Utf8PathBuf,
        /// The underlying walk error.
        #[source]
        source: walkdir::Error,
    },

    /// Failed to read a file.
    #[error("failed to read file {path}: {source}")]
    Read {
        /// The path of the file that couldn't be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the registrar (or create its directory).
    #[error("failed to persist registrar {path}: {source}")]
    Persist {
        /// The registrar file being written.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to encode the registrar contents.
    #[error("failed to encode registrar: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ScanError {
    /// Creates a new [`ScanError::ReadDir`] error.
    #[inline]
    pub fn read_dir(path: impl Into<Utf8PathBuf>, source: walkdir::Error) -> Self {
        Self::ReadDir {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`ScanError::Read`] error.
    #[inline]
    pub fn read(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`ScanError::Persist`] error.
    #[inline]
    pub fn persist(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Persist {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the error concerns a single file or directory and
    /// the rest of the cycle can proceed.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ReadDir { .. } | Self::Read { .. })
    }

    /// Returns `true` if the error is a registrar persistence failure.
    #[inline]
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(self, Self::Persist { .. } | Self::Serialize(_))
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::ReadDir { path, .. } | Self::Read { path, .. } | Self::Persist { path, .. } => {
                Some(path)
            }
            Self::Serialize(_) => None,
        }
    }
}
