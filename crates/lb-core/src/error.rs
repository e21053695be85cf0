//! Error types for the lb-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration loading
//! and validation failures.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration loading and validation.
///
/// # Examples
///
/// ```
/// use lb_core::ConfigError;
///
/// let error = ConfigError::invalid_option("schedule.period_secs", "must be positive");
/// assert!(error.to_string().contains("period_secs"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {0}")]
    NotFound(Utf8PathBuf),

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The dotted name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration {path}: {source}")]
    Io {
        /// The configuration file that could not be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    #[inline]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`ConfigError::Io`] error.
    #[inline]
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::NotFound(path) | Self::Io { path, .. } => Some(path),
            Self::InvalidOption { .. } | Self::Parse(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = ConfigError::NotFound(Utf8PathBuf::from("/etc/listbeat.json"));
        assert!(error.to_string().contains("/etc/listbeat.json"));
        assert_eq!(
            error.path().map(|p| p.as_str()),
            Some("/etc/listbeat.json")
        );
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("schedule.full_rescan_every", "must be positive");
        let msg = error.to_string();
        assert!(msg.contains("full_rescan_every"));
        assert!(msg.contains("must be positive"));
        assert!(error.path().is_none());
    }

    #[test]
    fn test_parse_error_from_serde() {
        let Err(source) = serde_json::from_str::<serde_json::Value>("{") else {
            panic!("expected a parse error");
        };
        let error = ConfigError::from(source);
        assert!(error.to_string().starts_with("failed to parse configuration"));
    }
}
