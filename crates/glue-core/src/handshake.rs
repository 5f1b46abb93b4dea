//! Process handshake between the host and a plugin subprocess.
//!
//! The host launches the plugin with [`MAGIC_COOKIE_KEY`] set and the desired
//! transport in [`PLUGIN_TYPE_ENV`]. Before serving anything the plugin prints
//! a single line to stdout:
//!
//! ```text
//! <protocol-version>|<cookie-key>=<cookie-value>|<network>|<address>|<transport>
//! 1|GLUE_PLUGIN_MAGIC_COOKIE=debugtalk|tcp|127.0.0.1:40123|grpc
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Handshake protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable carrying the magic cookie.
pub const MAGIC_COOKIE_KEY: &str = "GLUE_PLUGIN_MAGIC_COOKIE";

/// Expected value of [`MAGIC_COOKIE_KEY`].
pub const MAGIC_COOKIE_VALUE: &str = "debugtalk";

/// Environment variable selecting the plugin's transport (`rpc` or `grpc`).
pub const PLUGIN_TYPE_ENV: &str = "GLUE_PLUGIN_TYPE";

/// Environment variable holding a log filter for the plugin process.
pub const PLUGIN_LOG_ENV: &str = "GLUE_PLUGIN_LOG";

/// The only network type plugins listen on.
pub const NETWORK_TCP: &str = "tcp";

/// Wire protocol spoken between host and plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Lightweight RPC: length-delimited binary frames over TCP.
    Rpc,
    /// Schema RPC: a fixed two-method JSON-RPC contract over HTTP.
    #[default]
    Grpc,
}

impl TransportKind {
    /// Name used in the environment and the handshake line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rpc => "rpc",
            Self::Grpc => "grpc",
        }
    }

    /// Select a transport from an environment value.
    ///
    /// Only an explicit `rpc` selects [`TransportKind::Rpc`]; anything else,
    /// including an unset variable, selects [`TransportKind::Grpc`].
    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("rpc") => Self::Rpc,
            _ => Self::Grpc,
        }
    }

    /// Read [`PLUGIN_TYPE_ENV`] from the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(PLUGIN_TYPE_ENV).ok().as_deref())
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = HandshakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rpc" => Ok(Self::Rpc),
            "grpc" => Ok(Self::Grpc),
            other => Err(HandshakeError::UnsupportedTransport(other.to_string())),
        }
    }
}

/// Why a handshake line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    /// The line does not have the expected shape.
    #[error("malformed handshake line: {0:?}")]
    Malformed(String),

    /// The plugin speaks another protocol version.
    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version the host speaks.
        expected: u32,
        /// Version the plugin announced.
        actual: u32,
    },

    /// The cookie pair does not match.
    #[error("magic cookie mismatch")]
    CookieMismatch,

    /// The plugin listens on a network type the host cannot reach.
    #[error("unsupported network type: {0}")]
    UnsupportedNetwork(String),

    /// The plugin announced an unknown transport.
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),
}

/// Version and shared secret both sides must agree on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeConfig {
    /// Protocol version.
    pub protocol_version: u32,
    /// Cookie environment variable name.
    pub cookie_key: String,
    /// Cookie value.
    pub cookie_value: String,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            cookie_key: MAGIC_COOKIE_KEY.to_string(),
            cookie_value: MAGIC_COOKIE_VALUE.to_string(),
        }
    }
}

impl HandshakeConfig {
    /// Whether the current process was launched with the expected cookie.
    #[must_use]
    pub fn cookie_present(&self) -> bool {
        std::env::var(&self.cookie_key).is_ok_and(|v| v == self.cookie_value)
    }
}

/// A parsed handshake line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Protocol version.
    pub protocol_version: u32,
    /// Cookie key.
    pub cookie_key: String,
    /// Cookie value.
    pub cookie_value: String,
    /// Network type, always `tcp`.
    pub network: String,
    /// Listener address.
    pub address: SocketAddr,
    /// Transport served on `address`.
    pub transport: TransportKind,
}

impl Handshake {
    /// Handshake for a plugin listening on `address`.
    #[must_use]
    pub fn new(config: &HandshakeConfig, address: SocketAddr, transport: TransportKind) -> Self {
        Self {
            protocol_version: config.protocol_version,
            cookie_key: config.cookie_key.clone(),
            cookie_value: config.cookie_value.clone(),
            network: NETWORK_TCP.to_string(),
            address,
            transport,
        }
    }

    /// Parse a handshake line.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError`] if the line is malformed or names an
    /// unknown network or transport.
    pub fn parse(line: &str) -> Result<Self, HandshakeError> {
        let line = line.trim();
        let malformed = || HandshakeError::Malformed(line.to_string());

        let parts: Vec<&str> = line.split('|').collect();
        let [version, cookie, network, address, transport] = parts.as_slice() else {
            return Err(malformed());
        };

        let protocol_version = version.parse().map_err(|_| malformed())?;
        let (cookie_key, cookie_value) = cookie.split_once('=').ok_or_else(malformed)?;
        if *network != NETWORK_TCP {
            return Err(HandshakeError::UnsupportedNetwork((*network).to_string()));
        }
        let address = address.parse().map_err(|_| malformed())?;
        let transport = transport.parse()?;

        Ok(Self {
            protocol_version,
            cookie_key: cookie_key.to_string(),
            cookie_value: cookie_value.to_string(),
            network: (*network).to_string(),
            address,
            transport,
        })
    }

    /// Check the announced version and cookie against `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::VersionMismatch`] or
    /// [`HandshakeError::CookieMismatch`].
    pub fn verify(&self, config: &HandshakeConfig) -> Result<(), HandshakeError> {
        if self.protocol_version != config.protocol_version {
            return Err(HandshakeError::VersionMismatch {
                expected: config.protocol_version,
                actual: self.protocol_version,
            });
        }
        if self.cookie_key != config.cookie_key || self.cookie_value != config.cookie_value {
            return Err(HandshakeError::CookieMismatch);
        }
        Ok(())
    }
}

impl fmt::Display for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}={}|{}|{}|{}",
            self.protocol_version,
            self.cookie_key,
            self.cookie_value,
            self.network,
            self.address,
            self.transport
        )
    }
}
