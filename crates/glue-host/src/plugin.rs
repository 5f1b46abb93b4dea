//! The host-visible plugin contract.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use glue_core::{PluginResult, TransportKind, Value};

/// How a plugin is run and reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    /// Native executable speaking lightweight RPC.
    NativeRpc,
    /// Native executable speaking schema RPC.
    NativeGrpc,
    /// Python script speaking schema RPC.
    PythonGrpc,
    /// Functions living in the host process.
    InProcess,
}

impl PluginKind {
    /// Kind of a native executable served over `transport`.
    #[must_use]
    pub fn native(transport: TransportKind) -> Self {
        match transport {
            TransportKind::Rpc => Self::NativeRpc,
            TransportKind::Grpc => Self::NativeGrpc,
        }
    }

    /// Stable name, e.g. `native-grpc`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NativeRpc => "native-rpc",
            Self::NativeGrpc => "native-grpc",
            Self::PythonGrpc => "python-grpc",
            Self::InProcess => "in-process",
        }
    }

    /// Transport used to reach the plugin, if it runs out of process.
    #[must_use]
    pub fn transport(self) -> Option<TransportKind> {
        match self {
            Self::NativeRpc => Some(TransportKind::Rpc),
            Self::NativeGrpc | Self::PythonGrpc => Some(TransportKind::Grpc),
            Self::InProcess => None,
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loaded plugin.
///
/// Implementations are safe to share between tasks; every method takes
/// `&self`.
#[async_trait]
pub trait Plugin: fmt::Debug + Send + Sync {
    /// How the plugin is run.
    fn kind(&self) -> PluginKind;

    /// Path of the plugin artifact.
    fn path(&self) -> &Path;

    /// Whether the plugin exports `name`.
    ///
    /// Lookup failures answer `false`.
    async fn has(&self, name: &str) -> bool;

    /// Call `name` with positional arguments.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Call`](glue_core::PluginError::Call) when the
    /// function failed, or a transport/lifecycle error otherwise.
    async fn call(&self, name: &str, args: Vec<Value>) -> PluginResult<Value>;

    /// Shut the plugin down. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin process could not be stopped.
    async fn quit(&self) -> PluginResult<()>;
}
