//! Prelude module - commonly used types for convenient import.
//!
//! Use `use glue_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{CallError, PluginError, PluginResult};

// Registry and marshaling
pub use crate::FunctionRegistry;
pub use crate::marshal::{ParamType, Returns, Signature, Variadic};

// Transport contract
pub use crate::{CallEnvelope, FunctionCaller, TransportKind};

pub use crate::Value;
