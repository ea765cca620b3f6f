//! Evaluation functions and their registry.
//!
//! Functions are looked up by identifier URI and invoked over resolved
//! operands. The registry is populated explicitly by the host at
//! construction time; there is no process-wide function table.

mod builtin;

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use arbiter_core::id::FunctionId;
use arbiter_core::response::Status;
use arbiter_core::value::{Bag, Value};

/// A resolved function argument or result: a single value, a bag, or a
/// function reference passed to a higher-order function.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Bag(Bag),
    Function(FunctionId),
}

impl Operand {
    /// A boolean value operand.
    pub fn boolean(value: bool) -> Self {
        Self::Value(Value::Boolean(value))
    }

    /// A short description of the operand kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Bag(_) => "bag",
            Self::Function(_) => "function",
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bag(&self) -> Option<&Bag> {
        match self {
            Self::Bag(bag) => Some(bag),
            _ => None,
        }
    }
}

/// The number of arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    /// Whether the given argument count satisfies this arity.
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Self::Exact(n) => count == *n,
            Self::AtLeast(n) => count >= *n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "exactly {n}"),
            Self::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Errors raised while dispatching or applying a function.
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("Unknown function: {0}")]
    Unknown(FunctionId),

    #[error("Function {function} expects {expected} arguments, got {actual}")]
    ArityMismatch {
        function: FunctionId,
        expected: Arity,
        actual: usize,
    },

    #[error("Type mismatch in {function}: {message}")]
    TypeMismatch {
        function: FunctionId,
        message: String,
    },

    #[error("Function {function} failed: {message}")]
    Processing {
        function: FunctionId,
        message: String,
    },
}

impl FunctionError {
    /// The status an indeterminate decision carries for this error.
    pub fn status(&self) -> Status {
        match self {
            Self::Unknown(_) | Self::ArityMismatch { .. } | Self::TypeMismatch { .. } => {
                Status::syntax_error(self.to_string())
            }
            Self::Processing { .. } => Status::processing_error(self.to_string()),
        }
    }
}

/// An arity-checked evaluator over typed values and bags.
pub trait PolicyFunction: Send + Sync {
    /// The number of arguments this function accepts. Checked by
    /// [`invoke_checked`] before `invoke` is called.
    fn arity(&self) -> Arity;

    /// Apply the function to resolved arguments.
    ///
    /// The registry is passed through so higher-order functions can apply
    /// the function references they receive.
    fn invoke(
        &self,
        arguments: &[Operand],
        registry: &dyn FunctionRegistry,
    ) -> Result<Operand, FunctionError>;
}

/// Maps a function identifier to its evaluator.
pub trait FunctionRegistry: Send + Sync {
    /// Look up a function by identifier.
    fn lookup(&self, id: &FunctionId) -> Option<Arc<dyn PolicyFunction>>;
}

/// Look up a function, check its arity, and apply it.
pub fn invoke_checked(
    registry: &dyn FunctionRegistry,
    id: &FunctionId,
    arguments: &[Operand],
) -> Result<Operand, FunctionError> {
    let function = registry
        .lookup(id)
        .ok_or_else(|| FunctionError::Unknown(id.clone()))?;
    let arity = function.arity();
    if !arity.accepts(arguments.len()) {
        return Err(FunctionError::ArityMismatch {
            function: id.clone(),
            expected: arity,
            actual: arguments.len(),
        });
    }
    function.invoke(arguments, registry)
}

/// An in-memory function registry.
#[derive(Clone, Default)]
pub struct InMemoryFunctionRegistry {
    functions: Arc<DashMap<FunctionId, Arc<dyn PolicyFunction>>>,
}

impl InMemoryFunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry populated with the built-in standard functions.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        builtin::register_all(&registry);
        registry
    }

    /// Register a function under an identifier, replacing any previous
    /// registration.
    pub fn register(&self, id: FunctionId, function: Arc<dyn PolicyFunction>) {
        self.functions.insert(id, function);
    }
}

impl FunctionRegistry for InMemoryFunctionRegistry {
    fn lookup(&self, id: &FunctionId) -> Option<Arc<dyn PolicyFunction>> {
        self.functions.get(id).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> InMemoryFunctionRegistry {
        InMemoryFunctionRegistry::with_builtins()
    }

    fn id(name: &str) -> FunctionId {
        FunctionId::new(name)
    }

    #[test]
    fn test_unknown_function() {
        let result = invoke_checked(&registry(), &id("urn:example:function:nope"), &[]);
        assert!(matches!(result, Err(FunctionError::Unknown(_))));
    }

    #[test]
    fn test_arity_is_checked_before_dispatch() {
        let result = invoke_checked(
            &registry(),
            &id("urn:oasis:names:tc:xacml:1.0:function:string-equal"),
            &[Operand::Value(Value::from("a"))],
        );
        assert!(matches!(
            result,
            Err(FunctionError::ArityMismatch { actual: 1, .. })
        ));
    }

    #[test]
    fn test_arity_error_maps_to_syntax_status() {
        let error = FunctionError::ArityMismatch {
            function: id("urn:example:function:f"),
            expected: Arity::Exact(2),
            actual: 3,
        };
        assert_eq!(
            error.status().code,
            arbiter_core::response::StatusCode::SyntaxError
        );
    }

    #[test]
    fn test_processing_error_maps_to_processing_status() {
        let error = FunctionError::Processing {
            function: id("urn:example:function:f"),
            message: "division by zero".to_string(),
        };
        assert_eq!(
            error.status().code,
            arbiter_core::response::StatusCode::ProcessingError
        );
    }
}
