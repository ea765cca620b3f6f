//! Policy repository.
//!
//! Policy sets may include children by reference; the engine resolves those
//! references through a repository at evaluation time. A repository backed
//! by remote storage may block inside a lookup — the engine places no
//! timeout on it, and surfaces a failed lookup as an indeterminate decision
//! for the referencing node.

use std::sync::Arc;

use dashmap::DashMap;

use arbiter_core::id::{PolicyId, PolicySetId};
use arbiter_core::policy::{Policy, PolicySet};

/// Resolves policy and policy set references.
pub trait PolicyRepository: Send + Sync {
    /// Look up a policy by identifier.
    fn policy(&self, id: &PolicyId) -> Option<Arc<Policy>>;

    /// Look up a policy set by identifier.
    fn policy_set(&self, id: &PolicySetId) -> Option<Arc<PolicySet>>;
}

/// An in-memory policy repository.
#[derive(Clone, Default)]
pub struct InMemoryPolicyRepository {
    policies: Arc<DashMap<PolicyId, Arc<Policy>>>,
    policy_sets: Arc<DashMap<PolicySetId, Arc<PolicySet>>>,
}

impl InMemoryPolicyRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy, keyed by its own identifier.
    pub fn add_policy(&self, policy: Policy) {
        self.policies.insert(policy.id().clone(), Arc::new(policy));
    }

    /// Add a policy set, keyed by its own identifier.
    pub fn add_policy_set(&self, policy_set: PolicySet) {
        self.policy_sets
            .insert(policy_set.id().clone(), Arc::new(policy_set));
    }
}

impl PolicyRepository for InMemoryPolicyRepository {
    fn policy(&self, id: &PolicyId) -> Option<Arc<Policy>> {
        self.policies.get(id).map(|entry| entry.value().clone())
    }

    fn policy_set(&self, id: &PolicySetId) -> Option<Arc<PolicySet>> {
        self.policy_sets.get(id).map(|entry| entry.value().clone())
    }
}
