//! Domain types for the listbeat collector.
//!
//! - [`marker`] - The two kinds of marker directory
//! - [`target`] - Marker directories found by a scan
//! - [`file`] - Files selected for collection
//! - [`event`] - Records handed to the event sink
//!
//! All public types are re-exported here and at the crate root:
//!
//! ```
//! use lb_core::{MarkerKind, ScanTarget, OutboundEvent};
//! ```

mod event;
mod file;
mod marker;
mod target;

pub use event::OutboundEvent;
pub use file::{CandidateFile, CollectibleFile};
pub use marker::MarkerKind;
pub use target::ScanTarget;
