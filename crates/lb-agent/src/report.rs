//! Per-cycle reports and run totals.
//!
//! [`CycleReport`] is produced by every scheduler cycle and logged at
//! `info`; [`RunSummary`] accumulates them and is returned when the
//! scheduler stops.
//!
//! # Examples
//!
//! ```
//! use lb_agent::{CycleReport, RunSummary};
//! use lb_core::MarkerKind;
//!
//! let mut report = CycleReport::new(1, true);
//! report.kind_mut(MarkerKind::List).collected = 2;
//! report.kind_mut(MarkerKind::Log).collected = 1;
//! assert_eq!(report.collected(), 3);
//!
//! let mut summary = RunSummary::default();
//! summary.absorb(&report);
//! assert_eq!(summary.collected, 3);
//! assert_eq!(summary.full_scans, 1);
//! ```

use lb_core::MarkerKind;
use serde::{Deserialize, Serialize};

/// Counters for one marker kind within a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindReport {
    /// Marker directories processed.
    pub targets: usize,
    /// Files read and published.
    pub collected: usize,
    /// Files selected but unreadable.
    pub read_failures: usize,
    /// Marker directories that could not be listed.
    pub list_failures: usize,
    /// Files left for a later cycle by the per-cycle cap.
    pub deferred: usize,
    /// The registrar was written to disk.
    pub flushed: bool,
    /// A registrar write was attempted and failed.
    pub flush_failed: bool,
}

/// Outcome of one collection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// 1-based cycle number since the scheduler started.
    pub cycle: u64,
    /// A full directory walk ran instead of pruning the cache.
    pub full_scan: bool,
    /// Counters for `list` markers.
    pub list: KindReport,
    /// Counters for `LOG` markers.
    pub log: KindReport,
}

impl CycleReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(cycle: u64, full_scan: bool) -> Self {
        Self {
            cycle,
            full_scan,
            ..Self::default()
        }
    }

    /// Counters for `kind`.
    #[must_use]
    pub const fn kind(&self, kind: MarkerKind) -> &KindReport {
        match kind {
            MarkerKind::List => &self.list,
            MarkerKind::Log => &self.log,
        }
    }

    /// Mutable counters for `kind`.
    pub const fn kind_mut(&mut self, kind: MarkerKind) -> &mut KindReport {
        match kind {
            MarkerKind::List => &mut self.list,
            MarkerKind::Log => &mut self.log,
        }
    }

    /// Files collected across both kinds.
    #[must_use]
    pub const fn collected(&self) -> usize {
        self.list.collected + self.log.collected
    }

    /// Files deferred across both kinds.
    #[must_use]
    pub const fn deferred(&self) -> usize {
        self.list.deferred + self.log.deferred
    }

    /// Read and listing failures across both kinds.
    #[must_use]
    pub const fn failures(&self) -> usize {
        self.list.read_failures + self.list.list_failures + self.log.read_failures + self.log.list_failures
    }
}

/// Totals over a whole scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Cycles completed.
    pub cycles: u64,
    /// Cycles that walked the full tree.
    pub full_scans: u64,
    /// Files collected.
    pub collected: u64,
    /// Read and listing failures.
    pub failures: u64,
    /// Deferrals by the per-cycle cap (a file may count more than once).
    pub deferred: u64,
    /// Successful registrar writes.
    pub flushes: u64,
    /// Failed registrar writes.
    pub flush_failures: u64,
}

impl RunSummary {
    /// Adds one cycle to the totals.
    pub fn absorb(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.full_scans += u64::from(report.full_scan);
        self.collected += report.collected() as u64;
        self.failures += report.failures() as u64;
        self.deferred += report.deferred() as u64;
        for kind in MarkerKind::ALL {
            let counters = report.kind(kind);
            self.flushes += u64::from(counters.flushed);
            self.flush_failures += u64::from(counters.flush_failed);
        }
    }
}
