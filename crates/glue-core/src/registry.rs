//! Plugin-side function registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::CallError;
use crate::marshal::{self, Callable, DynamicCallable, Handler, Returns, Signature, TypedCallable};

/// Secondary lookup key for a function name: lower-cased with `_` removed.
///
/// `Sum_Two_Int` and `sumtwoint` share the alias `sumtwoint`.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// One registry entry.
#[derive(Clone)]
pub struct FunctionDescriptor {
    name: String,
    normalized_name: String,
    callable: Arc<dyn Callable>,
}

impl FunctionDescriptor {
    fn new(name: String, callable: Arc<dyn Callable>) -> Self {
        let normalized_name = normalize_name(&name);
        Self {
            name,
            normalized_name,
            callable,
        }
    }

    /// Name the entry is registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized alias of the name.
    #[must_use]
    pub fn normalized_name(&self) -> &str {
        &self.normalized_name
    }

    /// The function's declared parameters.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        self.callable.signature()
    }

    /// Whether two entries share the same underlying function.
    #[must_use]
    pub fn same_callable(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callable, &other.callable)
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("normalized_name", &self.normalized_name)
            .field("signature", self.callable.signature())
            .finish_non_exhaustive()
    }
}

/// Functions exposed by a plugin, keyed by name.
///
/// Built once during plugin bootstrap and then shared read-only with the
/// transport servers.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionDescriptor>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed closure under `name`.
    ///
    /// The first registration of a name wins; later ones are ignored.
    /// Returns whether the name was inserted.
    pub fn register<H, Args>(&mut self, name: impl Into<String>, handler: H) -> bool
    where
        H: Handler<Args>,
        Args: 'static,
    {
        self.register_callable(name, Arc::new(TypedCallable::new(handler)))
    }

    /// Register an untyped function with an explicit signature.
    pub fn register_dynamic(
        &mut self,
        name: impl Into<String>,
        signature: Signature,
        func: impl Fn(Vec<Value>) -> Returns + Send + Sync + 'static,
    ) -> bool {
        self.register_callable(name, Arc::new(DynamicCallable::new(signature, func)))
    }

    /// Register any [`Callable`] under `name`, plus its normalized alias.
    pub fn register_callable(&mut self, name: impl Into<String>, callable: Arc<dyn Callable>) -> bool {
        let name = name.into();
        if self.functions.contains_key(&name) {
            debug!(function = %name, "Function already registered, keeping first registration");
            return false;
        }

        let descriptor = FunctionDescriptor::new(name.clone(), callable);
        let alias = descriptor.normalized_name.clone();
        if !self.functions.contains_key(&alias) {
            let alias_entry = FunctionDescriptor::new(alias.clone(), Arc::clone(&descriptor.callable));
            self.functions.insert(alias, alias_entry);
        }
        self.functions.insert(name, descriptor);
        true
    }

    /// Every registered name, aliases included, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Look up an entry by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Number of entries, aliases included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Call the function registered under `name` with positional arguments.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::FunctionNotFound`] for an unknown name, or any
    /// marshaling or function error.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, CallError> {
        let descriptor = self
            .functions
            .get(name)
            .ok_or_else(|| CallError::FunctionNotFound {
                name: name.to_string(),
            })?;
        marshal::invoke(descriptor.callable.as_ref(), args)
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("names", &self.names())
            .finish()
    }
}
