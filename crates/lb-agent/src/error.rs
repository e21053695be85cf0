//! Error types for the lb-agent crate.
//!
//! This module provides the [`AgentError`] type for failures that stop the
//! agent from starting or end a collection run. Per-file and per-directory
//! problems never surface here; they are logged and counted in the
//! [`CycleReport`](crate::CycleReport).

use camino::Utf8PathBuf;
use lb_core::ConfigError;

/// Errors that can stop the agent.
///
/// All of them are fatal:
///
/// - **Configuration** ([`AgentError::Config`]): raised by
///   [`Scheduler::new`](crate::Scheduler::new); fix the config and restart
/// - **Output** ([`AgentError::Output`]): the sink cannot be opened
/// - **Task failure** ([`AgentError::TaskFailed`]): a cycle panicked
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Invalid or unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to open the event output.
    #[error("failed to open output {path}: {source}")]
    Output {
        /// The output file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The blocking cycle task panicked or was aborted.
    #[error("collection cycle task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl AgentError {
    /// Creates a new [`AgentError::Output`] error.
    #[inline]
    pub fn output(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Output {
            path: path.into(),
            source,
        }
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Config(e) => e.path(),
            Self::Output { path, .. } => Some(path),
            Self::TaskFailed(_) => None,
        }
    }
}
