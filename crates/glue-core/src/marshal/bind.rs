//! Binding untyped argument lists to declared signatures.

use serde_json::{Number, Value};

use super::param::{ParamType, Signature, value_type_name};
use crate::error::CallError;

/// 2^63, the first float past the `i64` range.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
/// 2^64, the first float past the `u64` range.
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

/// Shape `args` into one value per declared parameter of `signature`.
///
/// Fixed parameters bind positionally. A variadic tail is bound to a single
/// list: either the lone trailing argument when it already is a list of the
/// element type, or every remaining argument collected in order. `null`
/// arguments bind the parameter's zero value.
///
/// # Errors
///
/// Returns [`CallError::ArityMismatch`] when the argument count does not fit
/// and [`CallError::TypeMismatch`] when an argument cannot be converted.
pub fn bind(signature: &Signature, args: Vec<Value>) -> Result<Vec<Value>, CallError> {
    let fixed = signature.fixed();
    let got = args.len();
    let fits = if signature.is_variadic() {
        got >= fixed.len()
    } else {
        got == fixed.len()
    };
    if !fits {
        return Err(CallError::ArityMismatch {
            expected: fixed.len(),
            got,
        });
    }

    let mut args = args.into_iter();
    let mut bound = Vec::with_capacity(signature.len());
    for (index, (ty, value)) in fixed.iter().zip(args.by_ref()).enumerate() {
        bound.push(bind_value(ty, value, index)?);
    }

    if let Some(elem) = signature.variadic() {
        bound.push(bind_variadic(elem, args.collect(), fixed.len())?);
    }

    Ok(bound)
}

fn bind_variadic(elem: &ParamType, rest: Vec<Value>, start: usize) -> Result<Value, CallError> {
    if let [Value::Array(items)] = rest.as_slice() {
        let direct: Result<Vec<Value>, CallError> = items
            .iter()
            .cloned()
            .map(|item| bind_value(elem, item, start))
            .collect();
        if let Ok(items) = direct {
            return Ok(Value::Array(items));
        }
    }

    rest.into_iter()
        .enumerate()
        .map(|(offset, value)| bind_value(elem, value, start.saturating_add(offset)))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// Bind one argument to a declared type, converting where the types are
/// compatible.
///
/// # Errors
///
/// Returns [`CallError::TypeMismatch`] tagged with `index` when the value
/// cannot represent `ty`.
pub fn bind_value(ty: &ParamType, value: Value, index: usize) -> Result<Value, CallError> {
    if value.is_null() {
        return Ok(ty.zero_value());
    }

    let actual = value_type_name(&value);
    let mismatch = || CallError::TypeMismatch {
        index,
        expected: ty.to_string(),
        actual: actual.to_string(),
    };

    match (ty, value) {
        (ParamType::Any, value)
        | (ParamType::Bool, value @ Value::Bool(_))
        | (ParamType::Str, value @ Value::String(_))
        | (ParamType::Map, value @ Value::Object(_)) => Ok(value),
        (ParamType::Int, Value::Number(n)) => as_i64(&n).map(Value::from).ok_or_else(mismatch),
        (ParamType::Uint, Value::Number(n)) => as_u64(&n).map(Value::from).ok_or_else(mismatch),
        (ParamType::Float, Value::Number(n)) => n.as_f64().map(Value::from).ok_or_else(mismatch),
        (ParamType::List(elem), Value::Array(items)) => items
            .into_iter()
            .map(|item| bind_value(elem, item, index))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => Err(mismatch()),
    }
}

/// Convert a number to `i64`, truncating floats toward zero.
#[allow(clippy::cast_possible_truncation)]
fn as_i64(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    if let Some(u) = n.as_u64() {
        return i64::try_from(u).ok();
    }
    n.as_f64()
        .filter(|f| (-I64_BOUND..I64_BOUND).contains(f))
        .map(|f| f.trunc() as i64)
}

/// Convert a number to `u64`, truncating floats toward zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn as_u64(n: &Number) -> Option<u64> {
    if let Some(u) = n.as_u64() {
        return Some(u);
    }
    if let Some(i) = n.as_i64() {
        return u64::try_from(i).ok();
    }
    n.as_f64()
        .filter(|f| (0.0..U64_BOUND).contains(f))
        .map(|f| f.trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ints(n: usize) -> Signature {
        Signature::new(std::iter::repeat_n(ParamType::Int, n))
    }

    #[test]
    fn test_fixed_arity_must_match_exactly() {
        let sig = ints(4);
        for count in [0usize, 1, 3, 5, 8] {
            let args = vec![json!(1); count];
            let err = bind(&sig, args).unwrap_err();
            assert_eq!(
                err,
                CallError::ArityMismatch {
                    expected: 4,
                    got: count
                }
            );
        }
        assert!(bind(&sig, vec![json!(1); 4]).is_ok());
    }

    #[test]
    fn test_null_binds_zero_value() {
        let sig = Signature::new([ParamType::Int, ParamType::Str, ParamType::Float]);
        let bound = bind(&sig, vec![json!(null), json!(null), json!(null)]).unwrap();
        assert_eq!(bound, vec![json!(0), json!(""), json!(0.0)]);
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(bind_value(&ParamType::Int, json!(3.9), 0).unwrap(), json!(3));
        assert_eq!(bind_value(&ParamType::Int, json!(-3.9), 0).unwrap(), json!(-3));
        assert_eq!(bind_value(&ParamType::Float, json!(2), 0).unwrap(), json!(2.0));
        assert_eq!(bind_value(&ParamType::Uint, json!(7), 0).unwrap(), json!(7));
        assert!(bind_value(&ParamType::Uint, json!(-1), 0).is_err());
        assert!(bind_value(&ParamType::Int, json!(u64::MAX), 0).is_err());
    }

    #[test]
    fn test_type_mismatch_reports_position() {
        let sig = Signature::new([ParamType::Int, ParamType::Int]);
        let err = bind(&sig, vec![json!(1), json!("two")]).unwrap_err();
        assert_eq!(
            err,
            CallError::TypeMismatch {
                index: 1,
                expected: "int".into(),
                actual: "string".into(),
            }
        );
    }

    #[test]
    fn test_string_does_not_accept_numbers() {
        assert!(bind_value(&ParamType::Str, json!(1), 0).is_err());
        assert!(bind_value(&ParamType::Bool, json!("true"), 0).is_err());
    }

    #[test]
    fn test_variadic_collects_tail() {
        let sig = Signature::new([ParamType::Str]).with_variadic(ParamType::Any);
        let bound = bind(&sig, vec![json!("a"), json!(2), json!("c"), json!(3.4)]).unwrap();
        assert_eq!(bound, vec![json!("a"), json!([2, "c", 3.4])]);
    }

    #[test]
    fn test_variadic_accepts_empty_tail() {
        let sig = Signature::new([ParamType::Str]).with_variadic(ParamType::Int);
        let bound = bind(&sig, vec![json!("a")]).unwrap();
        assert_eq!(bound, vec![json!("a"), json!([])]);

        let err = bind(&sig, vec![]).unwrap_err();
        assert_eq!(err, CallError::ArityMismatch { expected: 1, got: 0 });
    }

    #[test]
    fn test_variadic_single_sequence_binds_directly() {
        let sig = Signature::default().with_variadic(ParamType::Int);
        let bound = bind(&sig, vec![json!([1, 2, 3])]).unwrap();
        assert_eq!(bound, vec![json!([1, 2, 3])]);
    }

    #[test]
    fn test_variadic_single_mismatched_sequence_is_wrapped() {
        let sig = Signature::default().with_variadic(ParamType::list(ParamType::Int));
        let bound = bind(&sig, vec![json!([1, 2])]).unwrap();
        assert_eq!(bound, vec![json!([[1, 2]])]);
    }

    #[test]
    fn test_variadic_tail_type_checked() {
        let sig = Signature::new([ParamType::Str]).with_variadic(ParamType::Float);
        let err = bind(&sig, vec![json!("x"), json!(1), json!(true)]).unwrap_err();
        assert_eq!(
            err,
            CallError::TypeMismatch {
                index: 2,
                expected: "float".into(),
                actual: "bool".into(),
            }
        );
    }

    #[test]
    fn test_list_elements_converted() {
        let bound = bind_value(&ParamType::list(ParamType::Float), json!([1, null, 2.5]), 0).unwrap();
        assert_eq!(bound, json!([1.0, 0.0, 2.5]));
    }
}
