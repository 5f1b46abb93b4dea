//! Typed Rust closures as dynamically callable functions.
//!
//! A closure such as `|a: i64, b: i64| a + b` implements [`Handler`]; its
//! argument types give the [`Signature`] used to bind untyped arguments, and
//! its output converts through [`IntoReturns`]. No runtime type inspection is
//! involved: each registered closure carries its own decoding.

use std::fmt;
use std::marker::PhantomData;

use serde_json::{Map, Value};

use super::param::{ParamKind, ParamType, Signature, value_type_name};
use super::returns::{IntoReturns, Returns};
use crate::error::CallError;

/// A native function with a declared signature.
pub trait Callable: Send + Sync {
    /// The declared parameters.
    fn signature(&self) -> &Signature;

    /// Run the function on arguments already shaped by
    /// [`bind`](super::bind::bind), one value per declared parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound value cannot be decoded into the native
    /// parameter type.
    fn call(&self, bound: Vec<Value>) -> Result<Returns, CallError>;
}

/// Decoding of one bound argument into a native type.
pub trait FromArg: Sized {
    /// The declared type this native type binds as.
    fn param_type() -> ParamType;

    /// Decode a value already converted to [`FromArg::param_type`].
    fn from_arg(value: Value) -> Option<Self>;
}

impl FromArg for Value {
    fn param_type() -> ParamType {
        ParamType::Any
    }

    fn from_arg(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromArg for bool {
    fn param_type() -> ParamType {
        ParamType::Bool
    }

    fn from_arg(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromArg for i64 {
    fn param_type() -> ParamType {
        ParamType::Int
    }

    fn from_arg(value: Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromArg for i32 {
    fn param_type() -> ParamType {
        ParamType::Int
    }

    fn from_arg(value: Value) -> Option<Self> {
        value.as_i64().and_then(|i| Self::try_from(i).ok())
    }
}

impl FromArg for u64 {
    fn param_type() -> ParamType {
        ParamType::Uint
    }

    fn from_arg(value: Value) -> Option<Self> {
        value.as_u64()
    }
}

impl FromArg for u32 {
    fn param_type() -> ParamType {
        ParamType::Uint
    }

    fn from_arg(value: Value) -> Option<Self> {
        value.as_u64().and_then(|u| Self::try_from(u).ok())
    }
}

impl FromArg for f64 {
    fn param_type() -> ParamType {
        ParamType::Float
    }

    fn from_arg(value: Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromArg for f32 {
    fn param_type() -> ParamType {
        ParamType::Float
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_arg(value: Value) -> Option<Self> {
        value.as_f64().map(|f| f as f32)
    }
}

impl FromArg for String {
    fn param_type() -> ParamType {
        ParamType::Str
    }

    fn from_arg(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FromArg for Map<String, Value> {
    fn param_type() -> ParamType {
        ParamType::Map
    }

    fn from_arg(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}

impl<T: FromArg> FromArg for Vec<T> {
    fn param_type() -> ParamType {
        ParamType::list(T::param_type())
    }

    fn from_arg(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_arg).collect(),
            _ => None,
        }
    }
}

/// Marks the trailing parameter of a handler as variadic.
///
/// `|head: String, Variadic(rest): Variadic<Value>|` accepts one string
/// followed by any number of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Variadic<T>(pub Vec<T>);

/// An argument position of a [`Handler`].
pub trait HandlerArg: Sized {
    /// How the argument appears in the signature.
    fn kind() -> ParamKind;

    /// Decode the bound value at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::TypeMismatch`] if the value does not decode.
    fn extract(index: usize, value: Value) -> Result<Self, CallError>;
}

fn decode<T: FromArg>(index: usize, value: Value) -> Result<T, CallError> {
    let actual = value_type_name(&value);
    T::from_arg(value).ok_or_else(|| CallError::TypeMismatch {
        index,
        expected: T::param_type().to_string(),
        actual: actual.to_string(),
    })
}

impl<T: FromArg> HandlerArg for T {
    fn kind() -> ParamKind {
        ParamKind::Fixed(T::param_type())
    }

    fn extract(index: usize, value: Value) -> Result<Self, CallError> {
        decode(index, value)
    }
}

impl<T: FromArg> HandlerArg for Variadic<T> {
    fn kind() -> ParamKind {
        ParamKind::Variadic(T::param_type())
    }

    fn extract(index: usize, value: Value) -> Result<Self, CallError> {
        decode::<Vec<T>>(index, value).map(Variadic)
    }
}

/// A typed function usable as a registry entry.
///
/// Implemented for `Fn` closures of up to eight [`HandlerArg`] parameters
/// whose output implements [`IntoReturns`].
pub trait Handler<Args>: Send + Sync + 'static {
    /// Signature derived from the parameter types.
    fn signature(&self) -> Signature;

    /// Decode the bound arguments and run the function.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument fails to decode.
    fn call(&self, bound: Vec<Value>) -> Result<Returns, CallError>;
}

fn next_arg(
    args: &mut impl Iterator<Item = (usize, Value)>,
    expected: usize,
) -> Result<(usize, Value), CallError> {
    args.next().ok_or(CallError::ArityMismatch { expected, got: 0 })
}

macro_rules! impl_handler {
    ($count:expr; $($ty:ident),*) => {
        impl<F, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: IntoReturns,
            $($ty: HandlerArg,)*
        {
            fn signature(&self) -> Signature {
                Signature::from_kinds(vec![$($ty::kind()),*])
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, bound: Vec<Value>) -> Result<Returns, CallError> {
                let got = bound.len();
                if got != $count {
                    return Err(CallError::ArityMismatch { expected: $count, got });
                }
                let mut args = bound.into_iter().enumerate();
                $(
                    let (index, value) = next_arg(&mut args, $count)?;
                    let $ty = $ty::extract(index, value)?;
                )*
                Ok((self)($($ty),*).into_returns())
            }
        }
    };
}

impl_handler!(0;);
impl_handler!(1; A1);
impl_handler!(2; A1, A2);
impl_handler!(3; A1, A2, A3);
impl_handler!(4; A1, A2, A3, A4);
impl_handler!(5; A1, A2, A3, A4, A5);
impl_handler!(6; A1, A2, A3, A4, A5, A6);
impl_handler!(7; A1, A2, A3, A4, A5, A6, A7);
impl_handler!(8; A1, A2, A3, A4, A5, A6, A7, A8);

/// A [`Handler`] paired with its derived signature.
pub struct TypedCallable<H, Args> {
    handler: H,
    signature: Signature,
    _args: PhantomData<fn() -> Args>,
}

impl<H, Args> TypedCallable<H, Args>
where
    H: Handler<Args>,
{
    /// Wrap a handler, deriving its signature once.
    pub fn new(handler: H) -> Self {
        let signature = handler.signature();
        Self {
            handler,
            signature,
            _args: PhantomData,
        }
    }
}

impl<H, Args> Callable for TypedCallable<H, Args>
where
    H: Handler<Args>,
    Args: 'static,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn call(&self, bound: Vec<Value>) -> Result<Returns, CallError> {
        self.handler.call(bound)
    }
}

impl<H, Args> fmt::Debug for TypedCallable<H, Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCallable")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

type DynamicFn = dyn Fn(Vec<Value>) -> Returns + Send + Sync;

/// An untyped function with an explicitly declared signature.
pub struct DynamicCallable {
    signature: Signature,
    func: Box<DynamicFn>,
}

impl DynamicCallable {
    /// Wrap a function receiving the bound argument list.
    pub fn new(
        signature: Signature,
        func: impl Fn(Vec<Value>) -> Returns + Send + Sync + 'static,
    ) -> Self {
        Self {
            signature,
            func: Box::new(func),
        }
    }
}

impl Callable for DynamicCallable {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn call(&self, bound: Vec<Value>) -> Result<Returns, CallError> {
        Ok((self.func)(bound))
    }
}

impl fmt::Debug for DynamicCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCallable")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}
