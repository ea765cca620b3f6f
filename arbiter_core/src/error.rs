//! Error types for the Arbiter decision engine.
//!
//! Only construction-time failures are modelled as errors. Failures during
//! evaluation are data: they become an `Indeterminate` decision carrying a
//! status, so combining algorithms can inspect and mask them.

use thiserror::Error;

/// Root error type for the Arbiter system.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),
}

/// Errors raised while constructing a policy tree.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Variable '{0}' is not defined by the enclosing policy")]
    UnresolvedVariable(String),

    #[error("Variable '{0}' is defined transitively in terms of itself")]
    CyclicVariable(String),

    #[error("Variable '{0}' is defined more than once")]
    DuplicateVariable(String),
}

/// Result type used throughout the Arbiter system.
pub type Result<T> = std::result::Result<T, Error>;
