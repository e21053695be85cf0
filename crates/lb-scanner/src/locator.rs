//! Marker directory discovery.
//!
//! This module provides [`MarkerLocator`], which walks scan roots looking for
//! `list` and `LOG` directories, and [`prune`], the cheap existence check
//! used on cycles that do not rescan.
//!
//! # Descent Rule
//!
//! At each directory visited (the root included), if an immediate child
//! directory carries the marker name, that child becomes a target and the
//! visited directory is not descended any further: neither the marker nor
//! its siblings are searched for nested markers.
//!
//! ```text
//! /data/a/list        <- target
//! /data/a/sub/list    <- not visited, /data/a already matched
//! /data/b/x/list      <- target, /data/b had no marker child
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8PathBuf;
//! use lb_core::MarkerKind;
//! use lb_scanner::MarkerLocator;
//!
//! let roots = vec![Utf8PathBuf::from("/data")];
//! let targets = MarkerLocator::new().full_scan(&roots, MarkerKind::List);
//!
//! for target in &targets {
//!     println!("Found: {}", target.path());
//! }
//! ```

use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use lb_core::{MarkerKind, ScanTarget};
use rustc_hash::FxHashSet;
use walkdir::WalkDir;

/// Finds marker directories under a set of roots.
///
/// A full scan walks the whole tree, so it is run on a slow cadence; the
/// resulting targets are kept and revalidated with [`prune`] in between.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerLocator {
    /// Whether to follow symbolic links.
    follow_links: bool,
}

impl MarkerLocator {
    /// Creates a locator that does not follow symbolic links.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            follow_links: false,
        }
    }

    /// Configures whether to follow symbolic links.
    ///
    /// By default, symbolic links are not followed.
    #[must_use]
    pub const fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Walks every root and returns the marker directories of `marker` kind.
    ///
    /// Roots that are missing or not directories are skipped with a
    /// warning. An unreadable subtree is skipped; the rest of the walk goes
    /// on. Targets reachable from overlapping roots are reported once, in
    /// discovery order.
    #[must_use]
    pub fn full_scan(&self, roots: &[Utf8PathBuf], marker: MarkerKind) -> Vec<ScanTarget> {
        let mut targets = Vec::new();
        let mut seen = FxHashSet::default();

        for root in roots {
            if !root.is_dir() {
                tracing::warn!(root = %root, "Scan root is not a directory, skipping");
                continue;
            }

            for path in self.scan_root(root, marker) {
                if seen.insert(path.clone()) {
                    targets.push(ScanTarget::new(path, marker));
                }
            }
        }

        tracing::debug!(
            marker = marker.dir_name(),
            roots = roots.len(),
            targets = targets.len(),
            "Full scan complete"
        );
        targets
    }

    /// Walks a single root.
    fn scan_root(&self, root: &Utf8Path, marker: MarkerKind) -> Vec<Utf8PathBuf> {
        let mut found = Vec::new();
        let mut walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .into_iter();

        while let Some(result) = walker.next() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(
                        path = ?e.path(),
                        error = %e,
                        "Skipping unreadable subtree"
                    );
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let candidate = entry.path().join(marker.dir_name());
            if !self.is_marker_dir(&candidate) {
                continue;
            }

            match Utf8PathBuf::from_path_buf(candidate) {
                Ok(path) => {
                    tracing::trace!(path = %path, "Marker directory found");
                    found.push(path);
                }
                Err(path) => {
                    tracing::warn!(path = %path.display(), "Skipping non-UTF-8 marker directory");
                }
            }
            walker.skip_current_dir();
        }

        found
    }

    /// Whether `candidate` is a directory, without resolving a final
    /// symlink unless links are followed.
    fn is_marker_dir(&self, candidate: &Path) -> bool {
        if self.follow_links {
            candidate.is_dir()
        } else {
            fs::symlink_metadata(candidate).is_ok_and(|meta| meta.file_type().is_dir())
        }
    }
}

/// Keeps the targets whose directory still exists.
///
/// One `stat` per target; used on every cycle that does not run a full
/// scan.
#[must_use]
pub fn prune(targets: Vec<ScanTarget>) -> Vec<ScanTarget> {
    let before = targets.len();
    let kept: Vec<ScanTarget> = targets
        .into_iter()
        .filter(|target| {
            let exists = target.path().is_dir();
            if !exists {
                tracing::debug!(path = %target.path(), "Marker directory gone, dropping target");
            }
            exists
        })
        .collect();

    if kept.len() != before {
        tracing::info!(dropped = before - kept.len(), kept = kept.len(), "Pruned stale targets");
    }
    kept
}
