//! Running registry calls off the async executor.

use std::sync::Arc;

use glue_core::{CallEnvelope, CallError, FunctionRegistry, Value};
use tracing::{debug, warn};

/// Invoke a registered function on the blocking pool.
///
/// Registered functions are ordinary synchronous code; a panic inside one is
/// reported to the caller as a failed call instead of tearing down the
/// connection.
pub(crate) async fn dispatch_call(
    registry: &Arc<FunctionRegistry>,
    envelope: CallEnvelope,
) -> Result<Value, CallError> {
    let CallEnvelope { name, args } = envelope;
    debug!(function = %name, args = args.len(), "Dispatching call");

    let registry = Arc::clone(registry);
    let task_name = name.clone();
    match tokio::task::spawn_blocking(move || registry.invoke(&task_name, args)).await {
        Ok(result) => result,
        Err(e) => {
            warn!(function = %name, error = %e, "Function panicked");
            Err(CallError::failed(format!("function {name} panicked")))
        },
    }
}
