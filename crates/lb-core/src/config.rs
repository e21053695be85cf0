//! Configuration structures for the listbeat collector.
//!
//! This module provides configuration types for every part of the agent:
//!
//! - [`ScheduleConfig`] - Tick period and full-rescan cadence
//! - [`ScanConfig`] - Scan roots and walk behaviour
//! - [`RegistrarConfig`] - Where collection state is persisted
//! - [`OutputConfig`] - Where collected events are written
//! - [`Config`] - Root configuration combining all sections
//!
//! All sections implement [`Default`] and deserialize with `#[serde(default)]`,
//! so a configuration file only needs the keys it wants to change.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Registrar file name used for `list` markers when the configured path is a directory.
pub const DEFAULT_LIST_REGISTRAR_FILE: &str = "registrar-list.json";

/// Registrar file name used for `LOG` markers when the configured path is a directory.
pub const DEFAULT_LOG_REGISTRAR_FILE: &str = "registrar-log.json";

/// Extension a configured registrar path must carry to be used as-is.
const REGISTRAR_EXTENSION: &str = ".json";

/// Default registrar location, relative to the working directory.
const DEFAULT_REGISTRAR_DIR: &str = "./data/registrar";

/// Configuration for the collection schedule.
///
/// # Examples
///
/// ```
/// use lb_core::ScheduleConfig;
///
/// let config = ScheduleConfig::default();
/// assert_eq!(config.period_secs, 10);
/// assert_eq!(config.full_rescan_every, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Interval between two collection cycles, in seconds.
    ///
    /// Production deployments typically use hours.
    pub period_secs: u64,

    /// Number of cycles between two full directory walks.
    ///
    /// Cycles in between reuse the cached marker directories after an
    /// existence check. `1` walks the tree on every cycle.
    pub full_rescan_every: u32,

    /// Run the first cycle immediately instead of after one period.
    pub collect_on_start: bool,
}

impl ScheduleConfig {
    /// Returns the tick period as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            period_secs: 10,
            full_rescan_every: 1,
            collect_on_start: false,
        }
    }
}

/// Configuration for marker directory discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Root directories searched for `list` and `LOG` marker directories.
    pub roots: Vec<Utf8PathBuf>,

    /// Whether the full walk follows symbolic links.
    pub follow_links: bool,

    /// Upper bound on files collected in one cycle.
    ///
    /// Files over the cap are left unrecorded and picked up by a later
    /// cycle. `None` means unbounded.
    pub max_files_per_cycle: Option<usize>,
}

/// Configuration for the registrar files.
///
/// Each path may either name a `.json` file directly or a directory, in which
/// case the default file name for that marker kind is appended (see
/// [`RegistrarConfig::list_file`]).
///
/// # Examples
///
/// ```
/// use lb_core::RegistrarConfig;
///
/// let config = RegistrarConfig::default();
/// assert_eq!(config.list_file().as_str(), "./data/registrar/registrar-list.json");
/// assert_eq!(config.log_file().as_str(), "./data/registrar/registrar-log.json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrarConfig {
    /// Registrar location for files found under `list` directories.
    pub list_path: Utf8PathBuf,

    /// Registrar location for files found under `LOG` directories.
    pub log_path: Utf8PathBuf,
}

impl RegistrarConfig {
    /// Resolved registrar file for `list` markers.
    #[must_use]
    pub fn list_file(&self) -> Utf8PathBuf {
        resolve_registrar_path(&self.list_path, DEFAULT_LIST_REGISTRAR_FILE)
    }

    /// Resolved registrar file for `LOG` markers.
    #[must_use]
    pub fn log_file(&self) -> Utf8PathBuf {
        resolve_registrar_path(&self.log_path, DEFAULT_LOG_REGISTRAR_FILE)
    }
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            list_path: Utf8PathBuf::from(DEFAULT_REGISTRAR_DIR),
            log_path: Utf8PathBuf::from(DEFAULT_REGISTRAR_DIR),
        }
    }
}

/// Appends `default_file_name` to `configured` unless it already names a
/// `.json` file.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use lb_core::config::resolve_registrar_path;
///
/// let file = resolve_registrar_path(Utf8Path::new("/var/lib/lb"), "registrar-list.json");
/// assert_eq!(file.as_str(), "/var/lib/lb/registrar-list.json");
///
/// let file = resolve_registrar_path(Utf8Path::new("/var/lib/lb/state.json"), "registrar-list.json");
/// assert_eq!(file.as_str(), "/var/lib/lb/state.json");
/// ```
#[must_use]
pub fn resolve_registrar_path(configured: &Utf8Path, default_file_name: &str) -> Utf8PathBuf {
    if configured.as_str().ends_with(REGISTRAR_EXTENSION) {
        configured.to_owned()
    } else {
        configured.join(default_file_name)
    }
}

/// Configuration for the event output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File that receives one JSON event per line. `None` writes to stdout.
    pub path: Option<Utf8PathBuf>,

    /// Pretty-print events instead of one compact object per line.
    pub pretty: bool,
}

/// Root configuration for the listbeat agent.
///
/// # Examples
///
/// ```
/// use lb_core::Config;
///
/// let json = r#"{"scan": {"roots": ["/data"]}, "schedule": {"full_rescan_every": 6}}"#;
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.scan.roots.len(), 1);
/// assert_eq!(config.schedule.full_rescan_every, 6);
/// assert_eq!(config.schedule.period_secs, 10);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collection schedule.
    pub schedule: ScheduleConfig,

    /// Marker discovery.
    pub scan: ScanConfig,

    /// Registrar persistence.
    pub registrar: RegistrarConfig,

    /// Event output.
    pub output: OutputConfig,
}

impl Config {
    /// Parses and validates a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_owned())
            } else {
                ConfigError::io(path, e)
            }
        })?;
        Self::from_json(&content)
    }

    /// Checks option values that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.period_secs == 0 {
            return Err(ConfigError::invalid_option(
                "schedule.period_secs",
                "must be greater than zero",
            ));
        }
        if self.schedule.full_rescan_every == 0 {
            return Err(ConfigError::invalid_option(
                "schedule.full_rescan_every",
                "must be greater than zero",
            ));
        }
        if self.scan.max_files_per_cycle == Some(0) {
            return Err(ConfigError::invalid_option(
                "scan.max_files_per_cycle",
                "must be greater than zero when set",
            ));
        }
        Ok(())
    }
}
