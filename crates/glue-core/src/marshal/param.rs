//! Declared parameter types and function signatures.

use std::fmt;

use serde_json::{Map, Value};

/// The declared type of one function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// Accepts any value unchanged.
    Any,
    /// Boolean.
    Bool,
    /// Signed integer.
    Int,
    /// Unsigned integer.
    Uint,
    /// Floating point number.
    Float,
    /// String.
    Str,
    /// Homogeneous list.
    List(Box<ParamType>),
    /// String-keyed map.
    Map,
}

impl ParamType {
    /// Shorthand for a list of `elem`.
    #[must_use]
    pub fn list(elem: Self) -> Self {
        Self::List(Box::new(elem))
    }

    /// The value bound when the caller passes `null`.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Any => Value::Null,
            Self::Bool => Value::Bool(false),
            Self::Int | Self::Uint => Value::from(0),
            Self::Float => Value::from(0.0),
            Self::Str => Value::String(String::new()),
            Self::List(_) => Value::Array(Vec::new()),
            Self::Map => Value::Object(Map::new()),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Uint => f.write_str("uint"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("string"),
            Self::List(elem) => write!(f, "[]{elem}"),
            Self::Map => f.write_str("map"),
        }
    }
}

/// Name of the runtime type of a dynamic value, for error messages.
#[must_use]
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// How a handler argument participates in a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// A single positional parameter.
    Fixed(ParamType),
    /// A trailing parameter collecting zero or more values of the element type.
    Variadic(ParamType),
}

/// The declared parameter list of a callable.
///
/// A signature has a fixed prefix and an optional variadic tail. The tail
/// counts as one declared parameter, bound to a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    fixed: Vec<ParamType>,
    variadic: Option<ParamType>,
}

impl Signature {
    /// A signature with the given fixed parameters and no variadic tail.
    #[must_use]
    pub fn new(fixed: impl IntoIterator<Item = ParamType>) -> Self {
        Self {
            fixed: fixed.into_iter().collect(),
            variadic: None,
        }
    }

    /// Add a variadic tail with the given element type.
    #[must_use]
    pub fn with_variadic(mut self, elem: ParamType) -> Self {
        self.variadic = Some(elem);
        self
    }

    /// Build a signature from handler argument kinds.
    ///
    /// Only a trailing [`ParamKind::Variadic`] becomes the variadic tail; one
    /// in any other position is treated as a fixed list parameter.
    #[must_use]
    pub fn from_kinds(kinds: Vec<ParamKind>) -> Self {
        let mut fixed = Vec::with_capacity(kinds.len());
        let mut variadic = None;
        let last = kinds.len().checked_sub(1);

        for (i, kind) in kinds.into_iter().enumerate() {
            match kind {
                ParamKind::Fixed(ty) => fixed.push(ty),
                ParamKind::Variadic(elem) if Some(i) == last => variadic = Some(elem),
                ParamKind::Variadic(elem) => fixed.push(ParamType::list(elem)),
            }
        }

        Self { fixed, variadic }
    }

    /// Fixed parameters, in order.
    #[must_use]
    pub fn fixed(&self) -> &[ParamType] {
        &self.fixed
    }

    /// Element type of the variadic tail, if any.
    #[must_use]
    pub fn variadic(&self) -> Option<&ParamType> {
        self.variadic.as_ref()
    }

    /// Whether the last parameter is variadic.
    #[must_use]
    pub fn is_variadic(&self) -> bool {
        self.variadic.is_some()
    }

    /// Declared parameter count, counting the variadic tail as one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fixed
            .len()
            .saturating_add(usize::from(self.variadic.is_some()))
    }

    /// Whether the signature takes no parameters at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, ty) in self.fixed.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty}")?;
        }
        if let Some(elem) = &self.variadic {
            if !self.fixed.is_empty() {
                f.write_str(", ")?;
            }
            write!(f, "...{elem}")?;
        }
        f.write_str(")")
    }
}
