//! Prelude module - commonly used types for convenient import.
//!
//! Use `use glue_host::prelude::*;` to import all essential types.

pub use glue_core::{PluginError, PluginResult, TransportKind, Value};

pub use crate::{InProcessPlugin, LoadOptions, Plugin, PluginKind, SupervisorConfig, load};
