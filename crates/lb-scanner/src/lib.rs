//! Marker discovery, change detection and collection state for listbeat.
//!
//! This crate holds the filesystem side of the agent:
//!
//! - [`MarkerLocator`]: finds `list` and `LOG` marker directories under the
//!   scan roots, stopping descent below a directory that has one
//! - [`prune`]: drops cached marker directories that no longer exist
//! - [`find_new_or_changed`]: lists the files of a marker directory whose
//!   modification time moved past the registrar entry
//! - [`RegistrarStore`]: the persisted `(dir, filename) -> collected_time`
//!   map, one per marker kind
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8PathBuf;
//! use lb_core::MarkerKind;
//! use lb_scanner::{MarkerLocator, RegistrarStore, find_new_or_changed};
//!
//! let roots = vec![Utf8PathBuf::from("/data")];
//! let registrar = RegistrarStore::load("./data/registrar/registrar-list.json");
//!
//! for target in MarkerLocator::new().full_scan(&roots, MarkerKind::List) {
//!     for file in find_new_or_changed(&target, target.extension(), &registrar)? {
//!         println!("Changed: {}", file.full_path());
//!     }
//! }
//! # Ok::<(), lb_scanner::ScanError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! MarkerLocator::full_scan ──► Vec<ScanTarget> ──► prune (between rescans)
//!                                    │
//!                                    ▼
//!                      find_new_or_changed(target, ext, registrar)
//!                                    │
//!                                    ▼
//!                            Vec<CandidateFile>
//! ```
//!
//! Recording a collected file into the registrar is the caller's job; the
//! detector only reads it.

mod detector;
mod error;
mod locator;
mod registrar;

pub use detector::{find_new_or_changed, has_extension, needs_collection};
pub use error::ScanError;
pub use locator::{MarkerLocator, prune};
pub use registrar::{RegistrarFile, RegistrarKey, RegistrarRecord, RegistrarStore};
