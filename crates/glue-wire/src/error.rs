//! Transport error types.

use std::io;

use glue_core::PluginError;

/// Errors raised by the transports themselves, never by the remote function.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Socket IO failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A message could not be encoded.
    #[error("encoding error: {0}")]
    Encode(String),

    /// A message could not be decoded.
    #[error("decoding error: {0}")]
    Decode(String),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The peer answered with a message that does not fit the request.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// JSON-RPC client or server failure.
    #[error("JSON-RPC error: {0}")]
    JsonRpc(String),
}

impl From<WireError> for PluginError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Encode(msg) | WireError::Decode(msg) => Self::Serialization(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Result type for transport operations.
pub type WireResult<T> = Result<T, WireError>;
