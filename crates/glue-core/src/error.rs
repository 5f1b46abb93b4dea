//! Error types shared by the host and plugin sides.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Errors produced while dispatching a single call.
///
/// These travel across the process boundary: the plugin side serializes them
/// into the response and the host side reconstructs them, so a caller can tell
/// a failing function apart from a broken transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallError {
    /// No function is registered under the requested name.
    #[error("function not found: {name}")]
    FunctionNotFound {
        /// The requested name.
        name: String,
    },

    /// The argument count does not fit the declared parameters.
    #[error("arity mismatch: expected {expected} arguments, got {got}")]
    ArityMismatch {
        /// Declared parameter count (the fixed prefix for variadic functions).
        expected: usize,
        /// Number of arguments supplied.
        got: usize,
    },

    /// An argument could not be bound to its declared parameter type.
    #[error("type mismatch for argument {index}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Zero-based argument position.
        index: usize,
        /// Declared parameter type.
        expected: String,
        /// Runtime type of the supplied argument.
        actual: String,
    },

    /// The callable produced more return values than a call result can hold.
    #[error("function should return at most 2 values, got {count}")]
    TooManyReturnValues {
        /// Number of values returned.
        count: usize,
    },

    /// The function ran and reported an error of its own.
    #[error("{message}")]
    Failed {
        /// Error message produced by the function.
        message: String,
    },
}

impl CallError {
    /// Build a [`CallError::Failed`] from any displayable error.
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed {
            message: message.to_string(),
        }
    }
}

/// Errors from plugin lifecycle and call operations.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The plugin answered with an incompatible or untrusted handshake.
    #[error("handshake with plugin {path} failed: {reason}")]
    HandshakeFailed {
        /// Plugin artifact path.
        path: PathBuf,
        /// What did not match.
        reason: String,
    },

    /// The plugin could not be started or connected to.
    #[error("failed to connect to plugin {path} after {attempts} attempt(s): {reason}")]
    ConnectFailed {
        /// Plugin artifact path.
        path: PathBuf,
        /// Attempts made before giving up.
        attempts: u32,
        /// Last failure reason.
        reason: String,
    },

    /// The remote function reported an error.
    #[error(transparent)]
    Call(#[from] CallError),

    /// The plugin process exited unexpectedly.
    #[error("plugin process {path} exited: {status}")]
    ProcessExited {
        /// Plugin artifact path.
        path: PathBuf,
        /// Exit status as reported by the OS.
        status: String,
    },

    /// The plugin crashed and could not be restarted.
    #[error("plugin {path} is unusable, restart failed: {reason}")]
    RestartExhausted {
        /// Plugin artifact path.
        path: PathBuf,
        /// Why the restart failed.
        reason: String,
    },

    /// No plugin artifact was found.
    #[error("plugin not found: {path}")]
    PluginNotFound {
        /// Path that was searched.
        path: PathBuf,
    },

    /// The artifact's file type has no loader.
    #[error("unsupported plugin type: {extension}")]
    UnsupportedPluginType {
        /// File extension of the artifact.
        extension: String,
    },

    /// A Python plugin was requested without an interpreter.
    #[error("python3 not specified")]
    PythonNotSpecified,

    /// The plugin has been shut down.
    #[error("plugin {path} has quit")]
    Closed {
        /// Plugin artifact path.
        path: PathBuf,
    },

    /// Connection-level failure (dropped connection, malformed payload).
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    /// Whether the error came from the remote function rather than the
    /// transport or the process.
    #[must_use]
    pub fn is_call_error(&self) -> bool {
        matches!(self, Self::Call(_))
    }

    /// Whether the plugin handle can no longer be used.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HandshakeFailed { .. } | Self::RestartExhausted { .. } | Self::Closed { .. }
        )
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_serialization() {
        let err = CallError::TypeMismatch {
            index: 2,
            expected: "int".into(),
            actual: "string".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "type_mismatch");
        assert_eq!(json["index"], 2);

        let parsed: CallError = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn test_call_error_display() {
        let err = CallError::FunctionNotFound {
            name: "missing_fn".into(),
        };
        assert_eq!(err.to_string(), "function not found: missing_fn");
        assert_eq!(CallError::failed("boom").to_string(), "boom");
    }

    #[test]
    fn test_plugin_error_classification() {
        let call: PluginError = CallError::failed("x").into();
        assert!(call.is_call_error());
        assert!(!call.is_fatal());

        let restart = PluginError::RestartExhausted {
            path: PathBuf::from("debugtalk.bin"),
            reason: "spawn failed".into(),
        };
        assert!(restart.is_fatal());
        assert!(!restart.is_call_error());
    }
}
