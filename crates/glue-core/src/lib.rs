//! Core types for glue plugins.
//!
//! Shared by the host and plugin sides:
//!
//! - [`marshal`]: binding untyped argument lists to native function signatures
//! - [`FunctionRegistry`]: the plugin's name → function table
//! - [`handshake`]: the line a plugin prints on startup and how it is checked
//! - [`FunctionCaller`]: the two-operation contract implemented by transports
//! - [`CallError`] / [`PluginError`]: the error taxonomy

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod caller;
pub mod error;
pub mod handshake;
pub mod marshal;
pub mod prelude;
pub mod registry;

pub use caller::{CallEnvelope, FunctionCaller};
pub use error::{CallError, PluginError, PluginResult};
pub use handshake::{Handshake, HandshakeConfig, HandshakeError, TransportKind};
pub use registry::{FunctionDescriptor, FunctionRegistry, normalize_name};

pub use serde_json::Value;
