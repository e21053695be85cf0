//! Marker directory kinds.
//!
//! This module provides the [`MarkerKind`] enum. A marker directory is a
//! directory named exactly `list` or `LOG` whose immediate children are the
//! files the agent collects.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of marker directory a file was found under.
///
/// The kind determines the directory name searched for, the file extension
/// collected, and the `type` tag carried by emitted events.
///
/// # Examples
///
/// ```
/// use lb_core::MarkerKind;
///
/// assert_eq!(MarkerKind::List.dir_name(), "list");
/// assert_eq!(MarkerKind::Log.dir_name(), "LOG");
/// assert_eq!(MarkerKind::Log.extension(), "log");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    /// `list` directories holding `.list` files.
    List,

    /// `LOG` directories holding `.log` files.
    Log,
}

impl MarkerKind {
    /// Both marker kinds, in the order a cycle processes them.
    pub const ALL: [Self; 2] = [Self::List, Self::Log];

    /// Exact directory name that marks a directory of this kind.
    #[inline]
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Log => "LOG",
        }
    }

    /// File extension (without the leading dot) collected under this marker.
    #[inline]
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Log => "log",
        }
    }

    /// Tag carried by events built from files of this kind.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Log => "log",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
