//! Decisions, statuses and the response returned to the enforcement point.
//!
//! `Indeterminate` is a first-class decision variant carrying a status, not
//! an error path, so combining algorithms can inspect and mask it as data.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{AdviceId, AttributeId, Category, ObligationId, PolicyId, PolicySetId};
use crate::policy::Effect;
use crate::request::CategoryAttributes;
use crate::value::Value;

/// Standardized status codes for a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Success,
    MissingAttribute,
    SyntaxError,
    ProcessingError,
}

impl StatusCode {
    /// Get the standardized status code URI.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Success => "urn:oasis:names:tc:xacml:1.0:status:ok",
            Self::MissingAttribute => "urn:oasis:names:tc:xacml:1.0:status:missing-attribute",
            Self::SyntaxError => "urn:oasis:names:tc:xacml:1.0:status:syntax-error",
            Self::ProcessingError => "urn:oasis:names:tc:xacml:1.0:status:processing-error",
        }
    }
}

/// A status code plus a human-readable message naming the failing
/// designator, function or node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Success,
            message: String::new(),
        }
    }

    pub fn missing_attribute(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::MissingAttribute,
            message: message.into(),
        }
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::SyntaxError,
            message: message.into(),
        }
    }

    pub fn processing_error(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::ProcessingError,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code.uri())
        } else {
            write!(f, "{}: {}", self.code.uri(), self.message)
        }
    }
}

/// The effect affinity of an indeterminate decision, used by the
/// deny- and permit-overrides algorithms for precise bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndeterminateKind {
    /// The node could only have evaluated to Permit.
    Permit,

    /// The node could only have evaluated to Deny.
    Deny,

    /// The node could have evaluated to either.
    DenyPermit,
}

impl From<Effect> for IndeterminateKind {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Permit => Self::Permit,
            Effect::Deny => Self::Deny,
        }
    }
}

/// An authorization decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate {
        kind: IndeterminateKind,
        status: Status,
    },
}

impl Decision {
    /// An indeterminate decision with the given affinity and status.
    pub fn indeterminate(kind: IndeterminateKind, status: Status) -> Self {
        Self::Indeterminate { kind, status }
    }

    /// The decision a rule with the given effect produces when it applies.
    pub fn from_effect(effect: Effect) -> Self {
        match effect {
            Effect::Permit => Self::Permit,
            Effect::Deny => Self::Deny,
        }
    }

    /// Whether the decision equals the given effect.
    pub fn matches_effect(&self, effect: Effect) -> bool {
        matches!(
            (self, effect),
            (Self::Permit, Effect::Permit) | (Self::Deny, Effect::Deny)
        )
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Indeterminate { .. })
    }

    /// The status carried by the decision; `Success` unless indeterminate.
    pub fn status(&self) -> Status {
        match self {
            Self::Indeterminate { status, .. } => status.clone(),
            _ => Status::ok(),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permit => write!(f, "Permit"),
            Self::Deny => write!(f, "Deny"),
            Self::NotApplicable => write!(f, "NotApplicable"),
            Self::Indeterminate { kind, .. } => match kind {
                IndeterminateKind::Permit => write!(f, "Indeterminate{{P}}"),
                IndeterminateKind::Deny => write!(f, "Indeterminate{{D}}"),
                IndeterminateKind::DenyPermit => write!(f, "Indeterminate{{DP}}"),
            },
        }
    }
}

/// One evaluated attribute of an obligation or advice directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeAssignment {
    pub attribute_id: AttributeId,
    pub category: Option<Category>,
    pub issuer: Option<String>,
    pub value: Value,
}

/// A directive the enforcement point must act upon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub id: ObligationId,
    pub assignments: Vec<AttributeAssignment>,
}

/// A directive the enforcement point may act upon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub id: AdviceId,
    pub assignments: Vec<AttributeAssignment>,
}

/// The outcome of evaluating one resource against the policy tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// The resource identifier this entry answers for, when the request
    /// named one.
    pub resource_id: Option<Value>,

    pub decision: Decision,
    pub status: Status,
    pub obligations: Vec<Obligation>,
    pub advice: Vec<Advice>,

    /// Request attributes flagged for echo.
    pub attributes: Vec<CategoryAttributes>,

    /// Applicable policy identifiers, when the request asked for them.
    pub policy_ids: Vec<PolicyId>,

    /// Applicable policy set identifiers, when the request asked for them.
    pub policy_set_ids: Vec<PolicySetId>,
}

/// The ordered collection of results for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub results: Vec<ResultEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_effect_mapping() {
        assert_eq!(Decision::from_effect(Effect::Permit), Decision::Permit);
        assert_eq!(Decision::from_effect(Effect::Deny), Decision::Deny);
        assert!(Decision::Permit.matches_effect(Effect::Permit));
        assert!(!Decision::Permit.matches_effect(Effect::Deny));
        assert!(!Decision::NotApplicable.matches_effect(Effect::Deny));
    }

    #[test]
    fn test_indeterminate_carries_status() {
        let decision = Decision::indeterminate(
            IndeterminateKind::Deny,
            Status::missing_attribute("no subject-id"),
        );
        assert!(decision.is_indeterminate());
        assert_eq!(decision.status().code, StatusCode::MissingAttribute);
        assert_eq!(decision.to_string(), "Indeterminate{D}");
    }
}
