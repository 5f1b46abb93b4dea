//! The logical two-operation contract every transport client provides.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PluginResult;

/// One invocation as it crosses the process boundary.
///
/// Argument order is preserved and `null` entries are kept in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    /// Function name.
    pub name: String,
    /// Positional arguments.
    pub args: Vec<Value>,
}

impl CallEnvelope {
    /// Create an envelope.
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Host-side view of a plugin's functions.
///
/// Implemented by both transport clients so the supervisor and facade do not
/// depend on the protocol in use.
#[async_trait]
pub trait FunctionCaller: Send + Sync {
    /// Names of every function the plugin exposes.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the round trip fails.
    async fn get_names(&self) -> PluginResult<Vec<String>>;

    /// Call a function by name with positional arguments.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Call`](crate::PluginError::Call) when the
    /// function itself failed and a transport error when the round trip
    /// failed.
    async fn call(&self, name: &str, args: Vec<Value>) -> PluginResult<Value>;
}
