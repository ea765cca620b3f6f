//! Engine configuration.
//!
//! All collaborators are passed in explicitly at construction; the engine
//! holds no process-wide mutable state.

use std::sync::Arc;

use crate::function::{FunctionRegistry, InMemoryFunctionRegistry};
use crate::xpath::{NullXPathResolver, XPathResolver};

/// The collaborators an engine evaluates with.
#[derive(Clone)]
pub struct EngineConfig {
    functions: Arc<dyn FunctionRegistry>,
    xpath: Arc<dyn XPathResolver>,
}

impl EngineConfig {
    /// Create a configuration from explicit collaborators.
    pub fn new(functions: Arc<dyn FunctionRegistry>, xpath: Arc<dyn XPathResolver>) -> Self {
        Self { functions, xpath }
    }

    /// The function registry.
    pub fn functions(&self) -> &dyn FunctionRegistry {
        self.functions.as_ref()
    }

    /// The path resolver.
    pub fn xpath(&self) -> &dyn XPathResolver {
        self.xpath.as_ref()
    }
}

impl Default for EngineConfig {
    /// Built-in functions and a resolver that selects nothing.
    fn default() -> Self {
        Self::new(
            Arc::new(InMemoryFunctionRegistry::with_builtins()),
            Arc::new(NullXPathResolver),
        )
    }
}
