//! Content selection.
//!
//! Attribute selectors address request content through a path expression.
//! The engine does not interpret paths itself; a resolver implementation is
//! supplied through the engine configuration.

use thiserror::Error;

/// Errors raised by a path resolver.
#[derive(Debug, Error)]
pub enum XPathError {
    #[error("Path evaluation failed: {0}")]
    Evaluation(String),
}

/// Selects nodes from request content by path.
pub trait XPathResolver: Send + Sync {
    /// Evaluate `path` against `content`, optionally anchored at a context
    /// node, returning the lexical form of each selected node.
    fn select(
        &self,
        content: &str,
        context_node: Option<&str>,
        path: &str,
    ) -> Result<Vec<String>, XPathError>;
}

/// A resolver that selects nothing.
///
/// With this resolver installed, selector resolution follows the
/// empty-selection rules: an empty bag, or a missing-attribute error when
/// the selector is marked required.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullXPathResolver;

impl XPathResolver for NullXPathResolver {
    fn select(
        &self,
        _content: &str,
        _context_node: Option<&str>,
        _path: &str,
    ) -> Result<Vec<String>, XPathError> {
        Ok(Vec::new())
    }
}
