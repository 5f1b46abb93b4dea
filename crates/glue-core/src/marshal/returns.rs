//! Native return values and their interpretation as a call result.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CallError;

/// One value returned by a native callable.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnValue {
    /// An ordinary value.
    Value(Value),
    /// An error value.
    Error(String),
}

/// The raw list of values a native callable returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Returns(Vec<ReturnValue>);

impl Returns {
    /// No return values.
    #[must_use]
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// A single ordinary value.
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self(vec![ReturnValue::Value(value.into())])
    }

    /// A single error value.
    #[must_use]
    pub fn error(message: impl Display) -> Self {
        Self(vec![ReturnValue::Error(message.to_string())])
    }

    /// Append a return value.
    #[must_use]
    pub fn push(mut self, value: ReturnValue) -> Self {
        self.0.push(value);
        self
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Collapse the return list into a call result.
    ///
    /// Zero values yield `null`; one value is the result, or the error if it
    /// is an error value; two values are read as `(value, error)` where a
    /// non-error second value means success.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Failed`] when the callable returned an error and
    /// [`CallError::TooManyReturnValues`] for more than two values.
    pub fn interpret(self) -> Result<Value, CallError> {
        let count = self.0.len();
        let mut values = self.0.into_iter();
        match (values.next(), values.next()) {
            (None, _) => Ok(Value::Null),
            _ if count > 2 => Err(CallError::TooManyReturnValues { count }),
            (Some(_), Some(ReturnValue::Error(message)))
            | (Some(ReturnValue::Error(message)), _) => Err(CallError::Failed { message }),
            (Some(ReturnValue::Value(value)), _) => Ok(value),
        }
    }
}

impl FromIterator<ReturnValue> for Returns {
    fn from_iter<I: IntoIterator<Item = ReturnValue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn serialized<T: Serialize>(value: &T) -> ReturnValue {
    match serde_json::to_value(value) {
        Ok(value) => ReturnValue::Value(value),
        Err(e) => ReturnValue::Error(format!("failed to serialize result: {e}")),
    }
}

/// Conversion from a handler's output into its raw return list.
///
/// `()` returns nothing, plain values return one value and `Result<T, E>`
/// returns the `(value, error)` pair.
pub trait IntoReturns {
    /// Convert into the raw return list.
    fn into_returns(self) -> Returns;
}

impl IntoReturns for () {
    fn into_returns(self) -> Returns {
        Returns::none()
    }
}

impl IntoReturns for Returns {
    fn into_returns(self) -> Returns {
        self
    }
}

impl<T: Serialize, E: Display> IntoReturns for Result<T, E> {
    fn into_returns(self) -> Returns {
        match self {
            Ok(value) => Returns::from_iter([serialized(&value), ReturnValue::Value(Value::Null)]),
            Err(e) => Returns::from_iter([
                ReturnValue::Value(Value::Null),
                ReturnValue::Error(e.to_string()),
            ]),
        }
    }
}

macro_rules! impl_into_returns_for_serialize {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoReturns for $ty {
                fn into_returns(self) -> Returns {
                    Returns(vec![serialized(&self)])
                }
            }
        )*
    };
}

impl_into_returns_for_serialize!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    &'static str,
    Value,
    Map<String, Value>,
);

impl<T: Serialize> IntoReturns for Vec<T> {
    fn into_returns(self) -> Returns {
        Returns(vec![serialized(&self)])
    }
}

impl<T: Serialize> IntoReturns for Option<T> {
    fn into_returns(self) -> Returns {
        Returns(vec![serialized(&self)])
    }
}

impl<T: Serialize> IntoReturns for HashMap<String, T> {
    fn into_returns(self) -> Returns {
        Returns(vec![serialized(&self)])
    }
}

impl<T: Serialize> IntoReturns for BTreeMap<String, T> {
    fn into_returns(self) -> Returns {
        Returns(vec![serialized(&self)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_returns_is_null() {
        assert_eq!(Returns::none().interpret().unwrap(), Value::Null);
        assert_eq!(().into_returns().interpret().unwrap(), Value::Null);
    }

    #[test]
    fn test_single_value_and_single_error() {
        assert_eq!(Returns::value(10).interpret().unwrap(), json!(10));
        assert_eq!(
            Returns::error("boom").interpret().unwrap_err(),
            CallError::failed("boom")
        );
    }

    #[test]
    fn test_pair_reads_as_value_and_error() {
        let ok: Result<i64, String> = Ok(3);
        assert_eq!(ok.into_returns().interpret().unwrap(), json!(3));

        let err: Result<i64, String> = Err("bad input".into());
        assert_eq!(
            err.into_returns().interpret().unwrap_err(),
            CallError::failed("bad input")
        );

        let pair = Returns::value("v").push(ReturnValue::Value(json!("ignored")));
        assert_eq!(pair.interpret().unwrap(), json!("v"));
    }

    #[test]
    fn test_more_than_two_values_fails() {
        let returns: Returns = (0..3).map(|i| ReturnValue::Value(json!(i))).collect();
        assert_eq!(
            returns.interpret().unwrap_err(),
            CallError::TooManyReturnValues { count: 3 }
        );
    }

    #[test]
    fn test_plain_values_serialize() {
        assert_eq!(
            vec![1, 2].into_returns().interpret().unwrap(),
            json!([1, 2])
        );
        assert_eq!("abc".into_returns().interpret().unwrap(), json!("abc"));
        assert_eq!(
            None::<i64>.into_returns().interpret().unwrap(),
            Value::Null
        );
    }
}
