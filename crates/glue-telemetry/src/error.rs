use std::path::PathBuf;

use thiserror::Error;

/// Failure to install a subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter string did not parse.
    #[error("invalid log filter `{filter}`: {reason}")]
    InvalidFilter {
        /// The combined filter that was rejected.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// A file target path with no file name.
    #[error("log file path has no file name: {}", .0.display())]
    InvalidTarget(PathBuf),

    /// The log file or directory could not be created.
    #[error("cannot open log output {}: {source}", path.display())]
    Output {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Another global subscriber is already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Result alias for logging setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
