//! Core types, configuration and errors for the listbeat collector.
//!
//! This crate provides the foundational types shared across the workspace:
//!
//! - [`Config`] and its sections, loaded from JSON
//! - [`ConfigError`] for configuration failures
//! - Domain types: [`MarkerKind`], [`ScanTarget`], [`CandidateFile`],
//!   [`CollectibleFile`] and [`OutboundEvent`]
//!
//! # Crate Dependencies
//!
//! ```text
//! lb-cli ──► lb-agent ──► lb-scanner ──► lb-core
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, OutputConfig, RegistrarConfig, ScanConfig, ScheduleConfig};
pub use error::ConfigError;
pub use types::{CandidateFile, CollectibleFile, MarkerKind, OutboundEvent, ScanTarget};
