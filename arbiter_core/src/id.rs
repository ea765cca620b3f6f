//! Strongly-typed identifiers for the Arbiter decision engine.
//!
//! Policies, rules, attributes, functions and data types are all named by
//! URI-shaped strings in the policy language. This module wraps them in
//! distinct types so a rule identifier can never be passed where a function
//! identifier is expected.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// A type-safe URI-shaped identifier.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri<T> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Uri<T> {
    /// Create an identifier from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

// Manual impls so the marker type needs no trait bounds of its own.
impl<T> Clone for Uri<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> PartialEq for Uri<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Uri<T> {}

impl<T> std::hash::Hash for Uri<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> fmt::Debug for Uri<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Uri").field(&self.value).finish()
    }
}

impl<T> fmt::Display for Uri<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> From<&str> for Uri<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T> From<String> for Uri<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Marker type for policies.
pub struct PolicyMarker;
/// Identifier for a policy.
pub type PolicyId = Uri<PolicyMarker>;

/// Marker type for policy sets.
pub struct PolicySetMarker;
/// Identifier for a policy set.
pub type PolicySetId = Uri<PolicySetMarker>;

/// Marker type for rules.
pub struct RuleMarker;
/// Identifier for a rule.
pub type RuleId = Uri<RuleMarker>;

/// Marker type for attributes.
pub struct AttributeMarker;
/// Identifier for a request attribute.
pub type AttributeId = Uri<AttributeMarker>;

/// Marker type for functions.
pub struct FunctionMarker;
/// Identifier for an evaluation function.
pub type FunctionId = Uri<FunctionMarker>;

/// Marker type for obligations.
pub struct ObligationMarker;
/// Identifier for an obligation.
pub type ObligationId = Uri<ObligationMarker>;

/// Marker type for advice.
pub struct AdviceMarker;
/// Identifier for an advice directive.
pub type AdviceId = Uri<AdviceMarker>;

/// Marker type for data types.
pub struct DataTypeMarker;
/// Identifier for an attribute data type.
pub type DataType = Uri<DataTypeMarker>;

impl DataType {
    pub fn string() -> Self {
        Self::new("http://www.w3.org/2001/XMLSchema#string")
    }

    pub fn boolean() -> Self {
        Self::new("http://www.w3.org/2001/XMLSchema#boolean")
    }

    pub fn integer() -> Self {
        Self::new("http://www.w3.org/2001/XMLSchema#integer")
    }

    pub fn double() -> Self {
        Self::new("http://www.w3.org/2001/XMLSchema#double")
    }

    pub fn date() -> Self {
        Self::new("http://www.w3.org/2001/XMLSchema#date")
    }

    pub fn time() -> Self {
        Self::new("http://www.w3.org/2001/XMLSchema#time")
    }

    pub fn date_time() -> Self {
        Self::new("http://www.w3.org/2001/XMLSchema#dateTime")
    }

    pub fn any_uri() -> Self {
        Self::new("http://www.w3.org/2001/XMLSchema#anyURI")
    }

    pub fn hex_binary() -> Self {
        Self::new("http://www.w3.org/2001/XMLSchema#hexBinary")
    }

    pub fn base64_binary() -> Self {
        Self::new("http://www.w3.org/2001/XMLSchema#base64Binary")
    }

    pub fn day_time_duration() -> Self {
        Self::new("http://www.w3.org/2001/XMLSchema#dayTimeDuration")
    }

    pub fn year_month_duration() -> Self {
        Self::new("http://www.w3.org/2001/XMLSchema#yearMonthDuration")
    }

    pub fn x500_name() -> Self {
        Self::new("urn:oasis:names:tc:xacml:1.0:data-type:x500Name")
    }

    pub fn rfc822_name() -> Self {
        Self::new("urn:oasis:names:tc:xacml:1.0:data-type:rfc822Name")
    }

    pub fn dns_name() -> Self {
        Self::new("urn:oasis:names:tc:xacml:2.0:data-type:dnsName")
    }

    pub fn ip_address() -> Self {
        Self::new("urn:oasis:names:tc:xacml:2.0:data-type:ipAddress")
    }
}

/// An attribute category.
///
/// The four classic categories are first-class variants; arbitrary category
/// URIs (XACML 3.0 custom categories) go through `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// The requesting subject.
    Subject,

    /// The resource being accessed.
    Resource,

    /// The action being performed.
    Action,

    /// The request environment.
    Environment,

    /// A custom category URI.
    Custom(String),
}

impl Category {
    /// Get the category URI.
    pub fn uri(&self) -> &str {
        match self {
            Self::Subject => "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject",
            Self::Resource => "urn:oasis:names:tc:xacml:3.0:attribute-category:resource",
            Self::Action => "urn:oasis:names:tc:xacml:3.0:attribute-category:action",
            Self::Environment => "urn:oasis:names:tc:xacml:3.0:attribute-category:environment",
            Self::Custom(uri) => uri,
        }
    }

    /// Map a category URI to a category, falling back to `Custom`.
    pub fn from_uri(uri: &str) -> Self {
        match uri {
            "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject" => Self::Subject,
            "urn:oasis:names:tc:xacml:3.0:attribute-category:resource" => Self::Resource,
            "urn:oasis:names:tc:xacml:3.0:attribute-category:action" => Self::Action,
            "urn:oasis:names:tc:xacml:3.0:attribute-category:environment" => Self::Environment,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}

impl AttributeId {
    /// The standard resource identifier attribute.
    pub fn resource_id() -> Self {
        Self::new("urn:oasis:names:tc:xacml:1.0:resource:resource-id")
    }
}
