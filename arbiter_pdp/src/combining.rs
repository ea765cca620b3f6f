//! Combining algorithms.
//!
//! Reduces an ordered sequence of child decisions to one decision. The
//! deny- and permit-overrides families use the indeterminate effect
//! affinity (Indeterminate{P}, {D}, {DP}) from the XACML 3.0 errata for
//! their bucketing.

use arbiter_core::policy::{PolicyCombiningAlgorithm, RuleCombiningAlgorithm};
use arbiter_core::response::{Decision, IndeterminateKind, Status};

/// Combine rule decisions under a policy.
///
/// The ordered variants must preserve document order; the unordered
/// variants may reorder but must yield the same result, so both are served
/// by the same in-order scan.
pub fn combine_rules(algorithm: RuleCombiningAlgorithm, decisions: &[Decision]) -> Decision {
    match algorithm {
        RuleCombiningAlgorithm::DenyOverrides | RuleCombiningAlgorithm::OrderedDenyOverrides => {
            deny_overrides(decisions)
        }
        RuleCombiningAlgorithm::PermitOverrides
        | RuleCombiningAlgorithm::OrderedPermitOverrides => permit_overrides(decisions),
        RuleCombiningAlgorithm::FirstApplicable => first_applicable(decisions),
        RuleCombiningAlgorithm::DenyUnlessPermit => deny_unless_permit(decisions),
        RuleCombiningAlgorithm::PermitUnlessDeny => permit_unless_deny(decisions),
    }
}

/// Combine child decisions under a policy set.
pub fn combine_policies(algorithm: PolicyCombiningAlgorithm, decisions: &[Decision]) -> Decision {
    match algorithm {
        PolicyCombiningAlgorithm::DenyOverrides
        | PolicyCombiningAlgorithm::OrderedDenyOverrides => deny_overrides(decisions),
        PolicyCombiningAlgorithm::PermitOverrides
        | PolicyCombiningAlgorithm::OrderedPermitOverrides => permit_overrides(decisions),
        PolicyCombiningAlgorithm::FirstApplicable => first_applicable(decisions),
        PolicyCombiningAlgorithm::OnlyOneApplicable => only_one_applicable(decisions),
        PolicyCombiningAlgorithm::DenyUnlessPermit => deny_unless_permit(decisions),
        PolicyCombiningAlgorithm::PermitUnlessDeny => permit_unless_deny(decisions),
    }
}

struct Buckets {
    permit: bool,
    deny: bool,
    indeterminate_p: bool,
    indeterminate_d: bool,
    indeterminate_dp: bool,
    first_status: Option<Status>,
}

impl Buckets {
    fn scan(decisions: &[Decision]) -> Self {
        let mut buckets = Self {
            permit: false,
            deny: false,
            indeterminate_p: false,
            indeterminate_d: false,
            indeterminate_dp: false,
            first_status: None,
        };
        for decision in decisions {
            match decision {
                Decision::Permit => buckets.permit = true,
                Decision::Deny => buckets.deny = true,
                Decision::NotApplicable => {}
                Decision::Indeterminate { kind, status } => {
                    match kind {
                        IndeterminateKind::Permit => buckets.indeterminate_p = true,
                        IndeterminateKind::Deny => buckets.indeterminate_d = true,
                        IndeterminateKind::DenyPermit => buckets.indeterminate_dp = true,
                    }
                    buckets.first_status.get_or_insert_with(|| status.clone());
                }
            }
        }
        buckets
    }

    fn status(&self) -> Status {
        self.first_status.clone().unwrap_or_else(Status::ok)
    }
}

fn deny_overrides(decisions: &[Decision]) -> Decision {
    let buckets = Buckets::scan(decisions);
    if buckets.deny {
        Decision::Deny
    } else if buckets.indeterminate_dp
        || (buckets.indeterminate_d && (buckets.indeterminate_p || buckets.permit))
    {
        Decision::indeterminate(IndeterminateKind::DenyPermit, buckets.status())
    } else if buckets.indeterminate_d {
        Decision::indeterminate(IndeterminateKind::Deny, buckets.status())
    } else if buckets.permit {
        Decision::Permit
    } else if buckets.indeterminate_p {
        Decision::indeterminate(IndeterminateKind::Permit, buckets.status())
    } else {
        Decision::NotApplicable
    }
}

fn permit_overrides(decisions: &[Decision]) -> Decision {
    let buckets = Buckets::scan(decisions);
    if buckets.permit {
        Decision::Permit
    } else if buckets.indeterminate_dp
        || (buckets.indeterminate_p && (buckets.indeterminate_d || buckets.deny))
    {
        Decision::indeterminate(IndeterminateKind::DenyPermit, buckets.status())
    } else if buckets.indeterminate_p {
        Decision::indeterminate(IndeterminateKind::Permit, buckets.status())
    } else if buckets.deny {
        Decision::Deny
    } else if buckets.indeterminate_d {
        Decision::indeterminate(IndeterminateKind::Deny, buckets.status())
    } else {
        Decision::NotApplicable
    }
}

/// The decision of the first child that is not NotApplicable, including an
/// indeterminate one, which stops the scan and is returned as-is.
fn first_applicable(decisions: &[Decision]) -> Decision {
    for decision in decisions {
        if !matches!(decision, Decision::NotApplicable) {
            return decision.clone();
        }
    }
    Decision::NotApplicable
}

/// Exactly one applicable child yields that child's decision verbatim;
/// more than one is a processing error.
fn only_one_applicable(decisions: &[Decision]) -> Decision {
    let mut applicable: Option<&Decision> = None;
    for decision in decisions {
        if matches!(decision, Decision::NotApplicable) {
            continue;
        }
        if applicable.is_some() {
            return Decision::indeterminate(
                IndeterminateKind::DenyPermit,
                Status::processing_error("more than one applicable child"),
            );
        }
        applicable = Some(decision);
    }
    match applicable {
        Some(decision) => decision.clone(),
        None => Decision::NotApplicable,
    }
}

/// Permit if any child permits; Deny otherwise. Never NotApplicable or
/// Indeterminate.
fn deny_unless_permit(decisions: &[Decision]) -> Decision {
    if decisions.iter().any(|d| matches!(d, Decision::Permit)) {
        Decision::Permit
    } else {
        Decision::Deny
    }
}

/// Deny if any child denies; Permit otherwise.
fn permit_unless_deny(decisions: &[Decision]) -> Decision {
    if decisions.iter().any(|d| matches!(d, Decision::Deny)) {
        Decision::Deny
    } else {
        Decision::Permit
    }
}
