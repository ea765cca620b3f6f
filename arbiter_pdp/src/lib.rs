//! Attribute-based access control decision engine.
//!
//! This crate evaluates decision requests against a policy tree built from
//! the types in `arbiter_core`. The entry point is
//! [`PolicyDecisionPoint::evaluate`], which walks targets, conditions and
//! combining algorithms and returns one result per requested resource.
//!
//! The engine has no global state. Everything pluggable — the function
//! registry, the content path resolver, the policy repository backing
//! reference resolution — is handed in through [`EngineConfig`] or at the
//! call site, so two engines with different configurations can coexist in
//! one process.
//!
//! # Example
//!
//! ```
//! use arbiter_core::policy::{Effect, Policy, PolicySetChild, Rule, RuleCombiningAlgorithm};
//! use arbiter_core::request::Request;
//! use arbiter_core::response::Decision;
//! use arbiter_pdp::{InMemoryPolicyRepository, PolicyDecisionPoint};
//!
//! let policy = Policy::from_rules(
//!     "urn:example:policy:allow-all",
//!     RuleCombiningAlgorithm::FirstApplicable,
//!     vec![Rule::new("permit", Effect::Permit)],
//! );
//!
//! let pdp = PolicyDecisionPoint::with_defaults();
//! let repository = InMemoryPolicyRepository::new();
//! let response = pdp.evaluate(&Request::new(), &PolicySetChild::Policy(policy), &repository);
//! assert_eq!(response.results[0].decision, Decision::Permit);
//! ```

pub mod aggregator;
pub mod combining;
pub mod config;
pub mod engine;
pub mod expression;
pub mod function;
pub mod repository;
pub mod target;
pub mod types;
pub mod xpath;

pub use aggregator::collect_directives;
pub use combining::{combine_policies, combine_rules};
pub use config::EngineConfig;
pub use engine::PolicyDecisionPoint;
pub use expression::EvaluationContext;
pub use function::{
    invoke_checked, Arity, FunctionError, FunctionRegistry, InMemoryFunctionRegistry, Operand,
    PolicyFunction,
};
pub use repository::{InMemoryPolicyRepository, PolicyRepository};
pub use target::{match_target, Applicability};
pub use types::{compare_values, parse_value, TypeError};
pub use xpath::{NullXPathResolver, XPathError, XPathResolver};
