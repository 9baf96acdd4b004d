//! Error types for configuration loading and analysis runs.
//!
//! Only run-level failures are errors here. Tool runtime problems and
//! unrecognized output lines are reported as data in the run outcome.

use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort an analysis run before or while it executes.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// The configured analyze directory does not exist.
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// The analyzer binary could not be started at all.
    #[error("failed to launch analyzer '{command}': {source}")]
    ToolLaunchFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A run was requested while another one is still in progress.
    #[error("an analysis run is already in progress")]
    AlreadyRunning,

    /// Source discovery pattern could not be built.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// The background worker thread panicked.
    #[error("analysis worker panicked")]
    WorkerPanicked,
}

/// Failures while reading, validating or writing settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access settings file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid settings: {0}")]
    Invalid(String),

    #[error("settings file already exists: {} (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),
}

impl ConfigError {
    pub fn parse(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
