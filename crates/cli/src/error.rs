//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Run cancelled before the worker produced results
    #[error("{mode} processing interrupted by shutdown signal")]
    Interrupted { mode: String },

    /// One or more sinks could not store the results
    #[error("Failed to write results to sinks: {}", names.join(", "))]
    SinksFailed { names: Vec<String> },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn interrupted(mode: impl Into<String>) -> Self {
        Self::Interrupted { mode: mode.into() }
    }
}
