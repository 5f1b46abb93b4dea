//! Argument marshaling.
//!
//! Turns an ordered list of untyped [`Value`]s into the parameters a native
//! function declares, runs the function, and collapses its return values
//! into a single call result.

mod bind;
mod handler;
mod param;
mod returns;

use serde_json::Value;

pub use bind::{bind, bind_value};
pub use handler::{
    Callable, DynamicCallable, FromArg, Handler, HandlerArg, TypedCallable, Variadic,
};
pub use param::{ParamKind, ParamType, Signature, value_type_name};
pub use returns::{IntoReturns, ReturnValue, Returns};

use crate::error::CallError;

/// Bind `args` to the callable's signature, run it and interpret the result.
///
/// # Errors
///
/// Returns the binding error, a decoding error from the callable, or the
/// error the callable itself returned.
pub fn invoke(callable: &dyn Callable, args: Vec<Value>) -> Result<Value, CallError> {
    let bound = bind(callable.signature(), args)?;
    callable.call(bound)?.interpret()
}
