//! Host configuration for loading and supervising plugins.
//!
//! Everything has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! transport = "grpc"
//! python = "/usr/bin/python3"
//!
//! [env]
//! FOO = "bar"
//!
//! [supervisor]
//! heartbeat_interval_secs = 15
//! startup_timeout_secs = 10
//! shutdown_timeout_secs = 5
//!
//! [supervisor.retry]
//! max_attempts = 3
//! backoff_unit_ms = 1000
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glue_core::{PluginError, PluginResult, TransportKind};
use serde::{Deserialize, Serialize};

/// Backoff policy for the spawn + handshake sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts before giving up. Zero is treated as one.
    pub max_attempts: u32,
    /// Unit of the quadratic backoff, in milliseconds.
    pub backoff_unit_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_unit_ms: default_backoff_unit_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

impl RetryPolicy {
    /// Delay before zero-based `attempt`: `unit * attempt²`.
    ///
    /// With the defaults that is 0 s, 1 s, 4 s.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = u64::from(attempt).saturating_mul(u64::from(attempt));
        Duration::from_millis(self.backoff_unit_ms.saturating_mul(factor))
    }

    /// Number of attempts actually made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Timing of the process supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Seconds between liveness checks.
    pub heartbeat_interval_secs: u64,
    /// Seconds to wait for the handshake line after spawning.
    pub startup_timeout_secs: u64,
    /// Seconds between SIGTERM and SIGKILL on quit.
    pub shutdown_timeout_secs: u64,
    /// Spawn retry policy.
    pub retry: RetryPolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            startup_timeout_secs: default_startup_timeout_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_heartbeat_interval_secs() -> u64 {
    15
}

fn default_startup_timeout_secs() -> u64 {
    10
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

impl SupervisorConfig {
    /// Interval between liveness checks, at least one second.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// How long to wait for the handshake line.
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Grace period between SIGTERM and SIGKILL.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Set the liveness interval.
    #[must_use]
    pub fn with_heartbeat_interval_secs(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = secs;
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn with_startup_timeout_secs(mut self, secs: u64) -> Self {
        self.startup_timeout_secs = secs;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.shutdown_timeout_secs = secs;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Options for [`load`](crate::load).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Transport for native plugins. Falls back to `GLUE_PLUGIN_TYPE`.
    pub transport: Option<TransportKind>,
    /// Interpreter for `.py` plugins.
    pub python: Option<PathBuf>,
    /// Extra environment for the plugin process.
    pub env: HashMap<String, String>,
    /// Supervisor timing.
    pub supervisor: SupervisorConfig,
}

impl LoadOptions {
    /// Parse options from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Config`] if the document is invalid.
    pub fn from_toml_str(content: &str) -> PluginResult<Self> {
        toml::from_str(content).map_err(|e| PluginError::Config(format!("Invalid config: {e}")))
    }

    /// Load options from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> PluginResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Transport selected by `GLUE_PLUGIN_TYPE` in the host's environment.
    #[must_use]
    pub fn transport_from_env() -> TransportKind {
        TransportKind::from_env()
    }

    /// The configured transport, or the environment's choice.
    #[must_use]
    pub fn effective_transport(&self) -> TransportKind {
        self.transport.unwrap_or_else(Self::transport_from_env)
    }

    /// Set the transport.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the Python interpreter.
    #[must_use]
    pub fn with_python(mut self, python: impl Into<PathBuf>) -> Self {
        self.python = Some(python.into());
        self
    }

    /// Add an environment variable for the plugin process.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the supervisor timing.
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: SupervisorConfig) -> Self {
        self.supervisor = supervisor;
        self
    }
}
