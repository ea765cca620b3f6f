//! # Arbiter Core
//!
//! `arbiter_core` provides the shared data model for the Arbiter
//! attribute-based access control engine: the policy tree, the decision
//! request, typed attribute values and the response returned to the
//! enforcement point.
//!
//! Key concepts:
//!
//! 1. **Policy tree**: policy sets, policies and rules, immutable once
//!    constructed and safely shared across concurrent evaluations.
//!
//! 2. **Bag**: an unordered, duplicate-permitting collection of typed
//!    values resolved from request attributes.
//!
//! 3. **Decision**: Permit, Deny, NotApplicable or Indeterminate — the
//!    last carrying a status as data rather than as an error path.
//!
//! 4. **Obligation/Advice**: directives returned alongside a decision,
//!    filtered by the effect they are attached to.

pub mod error;
pub mod expression;
pub mod id;
pub mod policy;
pub mod request;
pub mod response;
pub mod value;

// Re-export key types for convenience
pub use error::{Error, PolicyError, Result};
pub use expression::{AttributeDesignator, AttributeSelector, Expression};
pub use id::{
    AdviceId, AttributeId, Category, DataType, FunctionId, ObligationId, PolicyId, PolicySetId,
    RuleId,
};
pub use policy::{
    AdviceExpression, AllOf, AnyOf, AttributeAssignmentExpression, Effect, Match, MatchSource,
    ObligationExpression, Policy, PolicyCombiningAlgorithm, PolicySet, PolicySetChild, Rule,
    RuleCombiningAlgorithm, Target, VariableDefinition,
};
pub use request::{AttributeEntry, CategoryAttributes, Request};
pub use response::{
    Advice, AttributeAssignment, Decision, IndeterminateKind, Obligation, Response, ResultEntry,
    Status, StatusCode,
};
pub use value::{Bag, Value};
