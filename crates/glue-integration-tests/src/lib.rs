//! The `debugtalk` demo plugin's functions.
//!
//! Served out of process by the `debugtalk` binary and used in process by
//! the tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

use glue_core::FunctionRegistry;
use glue_core::Value;
use glue_core::marshal::Variadic;
use tracing::warn;

/// Message returned by `always_fails`.
pub const ALWAYS_FAILS_MESSAGE: &str = "this function always fails";

/// Registry with every demo function.
#[must_use]
pub fn debugtalk_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();

    registry.register("sum", |Variadic(values): Variadic<f64>| values.iter().sum::<f64>());
    registry.register("sum_ints", |Variadic(values): Variadic<i64>| {
        values.iter().fold(0i64, |acc, v| acc.saturating_add(*v))
    });
    registry.register("sum_two_int", |a: i64, b: i64| a.saturating_add(b));
    registry.register("sum_two_string", |a: String, b: String| format!("{a}{b}"));
    registry.register("sum_strings", |Variadic(values): Variadic<String>| values.concat());
    registry.register("concatenate", |Variadic(values): Variadic<Value>| {
        values.iter().map(display_value).collect::<String>()
    });
    registry.register("setup_hook_example", |name: String| {
        warn!(name, "setup_hook_example");
        format!("setup_hook_example: {name}")
    });
    registry.register("teardown_hook_example", |name: String| {
        warn!(name, "teardown_hook_example");
        format!("teardown_hook_example: {name}")
    });
    registry.register("get_user_agent", || {
        format!("glue/{}", env!("CARGO_PKG_VERSION"))
    });
    registry.register("always_fails", || -> Result<(), String> {
        Err(ALWAYS_FAILS_MESSAGE.to_string())
    });

    registry
}

/// Strings without quotes, everything else as JSON text.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
