//! The policy decision point.
//!
//! Walks the policy tree recursively for one request: targets first, then
//! rule conditions or child policies, then the combining algorithm, then
//! obligation aggregation. Reference children are resolved through the
//! repository as they are reached; a failed lookup becomes an indeterminate
//! decision for that branch, which the enclosing combining algorithm may
//! mask.

use tracing::{debug, warn};

use arbiter_core::policy::{
    AdviceExpression, Effect, ObligationExpression, Policy, PolicyCombiningAlgorithm, PolicySet,
    PolicySetChild, Rule,
};
use arbiter_core::request::Request;
use arbiter_core::response::{
    Advice, Decision, IndeterminateKind, Obligation, Response, ResultEntry, Status,
};
use arbiter_core::value::Value;
use arbiter_core::{PolicyId, PolicySetId};

use crate::aggregator::collect_directives;
use crate::combining::{combine_policies, combine_rules};
use crate::config::EngineConfig;
use crate::expression::EvaluationContext;
use crate::repository::PolicyRepository;
use crate::target::{match_target, Applicability};

/// The outcome of evaluating one node, carried up the tree.
#[derive(Debug, Clone)]
struct Evaluation {
    decision: Decision,
    obligations: Vec<Obligation>,
    advice: Vec<Advice>,
    policy_ids: Vec<PolicyId>,
    policy_set_ids: Vec<PolicySetId>,
}

impl Evaluation {
    fn not_applicable() -> Self {
        Self::bare(Decision::NotApplicable)
    }

    fn indeterminate(kind: IndeterminateKind, status: Status) -> Self {
        Self::bare(Decision::indeterminate(kind, status))
    }

    fn bare(decision: Decision) -> Self {
        Self {
            decision,
            obligations: Vec::new(),
            advice: Vec::new(),
            policy_ids: Vec::new(),
            policy_set_ids: Vec::new(),
        }
    }
}

/// The policy decision point: evaluates requests against a policy tree.
///
/// The engine holds only its configuration; every evaluation's mutable
/// state lives on that call's stack, so one engine serves arbitrarily many
/// concurrent evaluations.
pub struct PolicyDecisionPoint {
    config: EngineConfig,
}

impl PolicyDecisionPoint {
    /// Create an engine with the given collaborators.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Create an engine with built-in functions and no content resolver.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Evaluate a request against a policy tree, producing one result per
    /// requested resource.
    ///
    /// A request naming several resource identifiers is split into one
    /// single-resource evaluation each, in document order.
    pub fn evaluate(
        &self,
        request: &Request,
        root: &PolicySetChild,
        repository: &dyn PolicyRepository,
    ) -> Response {
        let resources = request.resource_ids();
        let results = if resources.len() > 1 {
            resources
                .iter()
                .map(|resource| {
                    let narrowed = request.for_resource(resource);
                    self.evaluate_once(&narrowed, Some(resource.clone()), root, repository)
                })
                .collect()
        } else {
            vec![self.evaluate_once(request, resources.into_iter().next(), root, repository)]
        };
        Response { results }
    }

    fn evaluate_once(
        &self,
        request: &Request,
        resource_id: Option<Value>,
        root: &PolicySetChild,
        repository: &dyn PolicyRepository,
    ) -> ResultEntry {
        let evaluation = self.evaluate_node(request, root, repository);
        let status = evaluation.decision.status();
        let (policy_ids, policy_set_ids) = if request.return_policy_id_list {
            (evaluation.policy_ids, evaluation.policy_set_ids)
        } else {
            (Vec::new(), Vec::new())
        };
        ResultEntry {
            resource_id,
            decision: evaluation.decision,
            status,
            obligations: evaluation.obligations,
            advice: evaluation.advice,
            attributes: request.echoed_attributes(),
            policy_ids,
            policy_set_ids,
        }
    }

    fn evaluate_node(
        &self,
        request: &Request,
        node: &PolicySetChild,
        repository: &dyn PolicyRepository,
    ) -> Evaluation {
        match node {
            PolicySetChild::Policy(policy) => self.evaluate_policy(request, policy),
            PolicySetChild::PolicySet(policy_set) => {
                self.evaluate_policy_set(request, policy_set, repository)
            }
            PolicySetChild::PolicyReference(id) => match repository.policy(id) {
                Some(policy) => self.evaluate_policy(request, &policy),
                None => {
                    warn!(policy = %id, "policy reference could not be resolved");
                    Evaluation::indeterminate(
                        IndeterminateKind::DenyPermit,
                        Status::processing_error(format!(
                            "policy reference {id} could not be resolved"
                        )),
                    )
                }
            },
            PolicySetChild::PolicySetReference(id) => match repository.policy_set(id) {
                Some(policy_set) => self.evaluate_policy_set(request, &policy_set, repository),
                None => {
                    warn!(policy_set = %id, "policy set reference could not be resolved");
                    Evaluation::indeterminate(
                        IndeterminateKind::DenyPermit,
                        Status::processing_error(format!(
                            "policy set reference {id} could not be resolved"
                        )),
                    )
                }
            },
        }
    }

    fn evaluate_policy(&self, request: &Request, policy: &Policy) -> Evaluation {
        let mut ctx = EvaluationContext::with_variables(request, &self.config, policy.variables());

        match match_target(&mut ctx, policy.target()) {
            Applicability::NotApplicable => return Evaluation::not_applicable(),
            Applicability::Indeterminate(status) => {
                return Evaluation::indeterminate(IndeterminateKind::DenyPermit, status)
            }
            Applicability::Applicable => {}
        }

        let rule_decisions: Vec<Decision> = policy
            .rules()
            .iter()
            .map(|rule| self.evaluate_rule(&mut ctx, rule))
            .collect();
        let decision = combine_rules(policy.rule_combining(), &rule_decisions);
        debug!(policy = %policy.id(), decision = %decision, "evaluated policy");

        let mut evaluation = Evaluation::bare(decision);
        let effect = match evaluation.decision {
            Decision::Permit => Effect::Permit,
            Decision::Deny => Effect::Deny,
            _ => return evaluation,
        };

        // Directives are evaluated only once the combined decision is
        // known; a rule's directives count when its own decision agrees
        // with it. A failing assignment demotes the whole node, so it can
        // never be masked behind a sibling rule's definitive decision.
        for (rule, rule_decision) in policy.rules().iter().zip(&rule_decisions) {
            if !rule_decision.matches_effect(effect) {
                continue;
            }
            match collect_directives(&mut ctx, effect, &rule.obligations, &rule.advice) {
                Ok((obligations, advice)) => {
                    evaluation.obligations.extend(obligations);
                    evaluation.advice.extend(advice);
                }
                Err(status) => {
                    warn!(rule = %rule.id, status = %status, "rule directive evaluation failed");
                    return Evaluation::indeterminate(effect.into(), status);
                }
            }
        }
        match collect_directives(&mut ctx, effect, policy.obligations(), policy.advice()) {
            Ok((obligations, advice)) => {
                evaluation.obligations.extend(obligations);
                evaluation.advice.extend(advice);
            }
            Err(status) => {
                warn!(policy = %policy.id(), status = %status, "policy directive evaluation failed");
                return Evaluation::indeterminate(effect.into(), status);
            }
        }
        evaluation.policy_ids.push(policy.id().clone());
        evaluation
    }

    fn evaluate_rule(&self, ctx: &mut EvaluationContext<'_>, rule: &Rule) -> Decision {
        if let Some(target) = &rule.target {
            match match_target(ctx, target) {
                Applicability::NotApplicable => return Decision::NotApplicable,
                Applicability::Indeterminate(status) => {
                    // Tagged with the rule's effect for combining.
                    return Decision::indeterminate(rule.effect.into(), status);
                }
                Applicability::Applicable => {}
            }
        }

        if let Some(condition) = &rule.condition {
            match ctx.evaluate_condition(condition) {
                Ok(true) => {}
                Ok(false) => return Decision::NotApplicable,
                Err(status) => {
                    debug!(rule = %rule.id, status = %status, "rule condition indeterminate");
                    return Decision::indeterminate(rule.effect.into(), status);
                }
            }
        }

        Decision::from_effect(rule.effect)
    }

    fn evaluate_policy_set(
        &self,
        request: &Request,
        policy_set: &PolicySet,
        repository: &dyn PolicyRepository,
    ) -> Evaluation {
        let mut ctx = EvaluationContext::new(request, &self.config);

        match match_target(&mut ctx, policy_set.target()) {
            Applicability::NotApplicable => return Evaluation::not_applicable(),
            Applicability::Indeterminate(status) => {
                return Evaluation::indeterminate(IndeterminateKind::DenyPermit, status)
            }
            Applicability::Applicable => {}
        }

        let (decision, child_evaluations) = if policy_set.policy_combining()
            == PolicyCombiningAlgorithm::OnlyOneApplicable
        {
            self.evaluate_only_one_applicable(request, policy_set, repository)
        } else {
            let child_evaluations: Vec<Evaluation> = policy_set
                .children()
                .iter()
                .map(|child| self.evaluate_node(request, child, repository))
                .collect();
            let decisions: Vec<Decision> = child_evaluations
                .iter()
                .map(|evaluation| evaluation.decision.clone())
                .collect();
            (
                combine_policies(policy_set.policy_combining(), &decisions),
                child_evaluations,
            )
        };
        debug!(policy_set = %policy_set.id(), decision = %decision, "evaluated policy set");

        let mut evaluation = self.finish_node(
            &mut ctx,
            decision,
            child_evaluations,
            policy_set.obligations(),
            policy_set.advice(),
        );
        if !matches!(
            evaluation.decision,
            Decision::NotApplicable | Decision::Indeterminate { .. }
        ) {
            evaluation.policy_set_ids.push(policy_set.id().clone());
        }
        evaluation
    }

    /// Only-one-applicable checks every child's target before evaluating
    /// any child body, then evaluates exactly the one applicable child.
    fn evaluate_only_one_applicable(
        &self,
        request: &Request,
        policy_set: &PolicySet,
        repository: &dyn PolicyRepository,
    ) -> (Decision, Vec<Evaluation>) {
        let mut applicable_child: Option<&PolicySetChild> = None;
        for child in policy_set.children() {
            match self.child_applicability(request, child, repository) {
                Applicability::NotApplicable => {}
                Applicability::Indeterminate(status) => {
                    return (
                        Decision::indeterminate(IndeterminateKind::DenyPermit, status),
                        Vec::new(),
                    )
                }
                Applicability::Applicable => {
                    if applicable_child.is_some() {
                        return (
                            Decision::indeterminate(
                                IndeterminateKind::DenyPermit,
                                Status::processing_error(format!(
                                    "more than one applicable child under policy set {}",
                                    policy_set.id()
                                )),
                            ),
                            Vec::new(),
                        );
                    }
                    applicable_child = Some(child);
                }
            }
        }
        match applicable_child {
            Some(child) => {
                let evaluation = self.evaluate_node(request, child, repository);
                (evaluation.decision.clone(), vec![evaluation])
            }
            None => (Decision::NotApplicable, Vec::new()),
        }
    }

    fn child_applicability(
        &self,
        request: &Request,
        child: &PolicySetChild,
        repository: &dyn PolicyRepository,
    ) -> Applicability {
        match child {
            PolicySetChild::Policy(policy) => {
                let mut ctx =
                    EvaluationContext::with_variables(request, &self.config, policy.variables());
                match_target(&mut ctx, policy.target())
            }
            PolicySetChild::PolicySet(policy_set) => {
                let mut ctx = EvaluationContext::new(request, &self.config);
                match_target(&mut ctx, policy_set.target())
            }
            PolicySetChild::PolicyReference(id) => match repository.policy(id) {
                Some(policy) => {
                    let mut ctx = EvaluationContext::with_variables(
                        request,
                        &self.config,
                        policy.variables(),
                    );
                    match_target(&mut ctx, policy.target())
                }
                None => Applicability::Indeterminate(Status::processing_error(format!(
                    "policy reference {id} could not be resolved"
                ))),
            },
            PolicySetChild::PolicySetReference(id) => match repository.policy_set(id) {
                Some(policy_set) => {
                    let mut ctx = EvaluationContext::new(request, &self.config);
                    match_target(&mut ctx, policy_set.target())
                }
                None => Applicability::Indeterminate(Status::processing_error(format!(
                    "policy set reference {id} could not be resolved"
                ))),
            },
        }
    }

    /// Fold child obligations into the node, evaluate the node's own
    /// directives, and escalate if any directive fails.
    fn finish_node(
        &self,
        ctx: &mut EvaluationContext<'_>,
        decision: Decision,
        children: Vec<Evaluation>,
        obligations: &[ObligationExpression],
        advice: &[AdviceExpression],
    ) -> Evaluation {
        let mut evaluation = Evaluation::bare(decision);

        let effect = match evaluation.decision {
            Decision::Permit => Some(Effect::Permit),
            Decision::Deny => Some(Effect::Deny),
            _ => None,
        };
        let Some(effect) = effect else {
            return evaluation;
        };

        // Children surface their directives only when their own decision
        // agrees with the combined one.
        for child in children {
            if child.decision.matches_effect(effect) {
                evaluation.obligations.extend(child.obligations);
                evaluation.advice.extend(child.advice);
                evaluation.policy_ids.extend(child.policy_ids);
                evaluation.policy_set_ids.extend(child.policy_set_ids);
            }
        }

        match collect_directives(ctx, effect, obligations, advice) {
            Ok((own_obligations, own_advice)) => {
                evaluation.obligations.extend(own_obligations);
                evaluation.advice.extend(own_advice);
                evaluation
            }
            Err(status) => {
                warn!(status = %status, "directive evaluation failed, escalating to indeterminate");
                Evaluation::indeterminate(effect.into(), status)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::expression::{AttributeDesignator, Expression};
    use arbiter_core::id::{AttributeId, Category, DataType};
    use arbiter_core::policy::{Match, RuleCombiningAlgorithm, Target};
    use arbiter_core::response::StatusCode;

    use crate::repository::InMemoryPolicyRepository;

    const STRING_EQUAL: &str = "urn:oasis:names:tc:xacml:1.0:function:string-equal";

    fn resource_target(resource: &str) -> Target {
        Target::single(Match::designator(
            STRING_EQUAL,
            Value::from(resource),
            AttributeDesignator::new(
                Category::Resource,
                AttributeId::resource_id(),
                DataType::string(),
            ),
        ))
    }

    fn doc_request(resource: &str) -> Request {
        Request::new().with_attribute(
            Category::Resource,
            AttributeId::resource_id(),
            Value::from(resource),
        )
    }

    #[test]
    fn test_rule_without_target_follows_condition_only() {
        let policy = Policy::from_rules(
            "urn:example:policy:open",
            RuleCombiningAlgorithm::FirstApplicable,
            vec![Rule::new("rule-1", Effect::Permit)
                .with_condition(Expression::boolean(false))],
        );
        let pdp = PolicyDecisionPoint::with_defaults();
        let repository = InMemoryPolicyRepository::new();
        let response = pdp.evaluate(
            &doc_request("doc1"),
            &PolicySetChild::Policy(policy),
            &repository,
        );
        assert_eq!(response.results[0].decision, Decision::NotApplicable);
    }

    #[test]
    fn test_indeterminate_condition_is_tagged_with_rule_effect() {
        let policy = Policy::from_rules(
            "urn:example:policy:broken",
            RuleCombiningAlgorithm::DenyOverrides,
            vec![Rule::new("rule-1", Effect::Deny).with_condition(Expression::apply(
                "urn:example:function:unknown",
                vec![],
            ))],
        );
        let pdp = PolicyDecisionPoint::with_defaults();
        let repository = InMemoryPolicyRepository::new();
        let response = pdp.evaluate(
            &doc_request("doc1"),
            &PolicySetChild::Policy(policy),
            &repository,
        );
        match &response.results[0].decision {
            Decision::Indeterminate { kind, status } => {
                assert_eq!(*kind, IndeterminateKind::Deny);
                assert_eq!(status.code, StatusCode::SyntaxError);
            }
            other => panic!("expected indeterminate, got {other:?}"),
        }
    }

    #[test]
    fn test_unmatched_policy_target_is_not_applicable() {
        let policy = Policy::new(
            "urn:example:policy:other-doc",
            resource_target("doc2"),
            RuleCombiningAlgorithm::FirstApplicable,
            Vec::new(),
            vec![Rule::new("rule-1", Effect::Permit)],
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        let pdp = PolicyDecisionPoint::with_defaults();
        let repository = InMemoryPolicyRepository::new();
        let response = pdp.evaluate(
            &doc_request("doc1"),
            &PolicySetChild::Policy(policy),
            &repository,
        );
        assert_eq!(response.results[0].decision, Decision::NotApplicable);
        assert!(response.results[0].status.is_ok());
    }

    #[test]
    fn test_unresolved_reference_is_indeterminate_processing() {
        let pdp = PolicyDecisionPoint::with_defaults();
        let repository = InMemoryPolicyRepository::new();
        let response = pdp.evaluate(
            &doc_request("doc1"),
            &PolicySetChild::PolicyReference(PolicyId::new("urn:example:policy:gone")),
            &repository,
        );
        match &response.results[0].decision {
            Decision::Indeterminate { status, .. } => {
                assert_eq!(status.code, StatusCode::ProcessingError);
                assert!(status.message.contains("urn:example:policy:gone"));
            }
            other => panic!("expected indeterminate, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_resource_request_yields_one_result_each() {
        let policy = Policy::new(
            "urn:example:policy:doc1-only",
            Target::match_all(),
            RuleCombiningAlgorithm::FirstApplicable,
            Vec::new(),
            vec![
                Rule::new("permit-doc1", Effect::Permit).with_target(resource_target("doc1")),
                Rule::new("deny-rest", Effect::Deny),
            ],
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        let mut request = doc_request("doc1");
        request.add_attribute(
            Category::Resource,
            AttributeId::resource_id(),
            Value::from("doc2"),
        );

        let pdp = PolicyDecisionPoint::with_defaults();
        let repository = InMemoryPolicyRepository::new();
        let response = pdp.evaluate(&request, &PolicySetChild::Policy(policy), &repository);

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].resource_id, Some(Value::from("doc1")));
        assert_eq!(response.results[0].decision, Decision::Permit);
        assert_eq!(response.results[1].resource_id, Some(Value::from("doc2")));
        assert_eq!(response.results[1].decision, Decision::Deny);
    }

    #[test]
    fn test_policy_id_list_is_returned_on_request() {
        let policy = Policy::from_rules(
            "urn:example:policy:permit",
            RuleCombiningAlgorithm::FirstApplicable,
            vec![Rule::new("rule-1", Effect::Permit)],
        );
        let mut request = doc_request("doc1");
        request.return_policy_id_list = true;

        let pdp = PolicyDecisionPoint::with_defaults();
        let repository = InMemoryPolicyRepository::new();
        let response = pdp.evaluate(&request, &PolicySetChild::Policy(policy), &repository);
        assert_eq!(
            response.results[0].policy_ids,
            vec![PolicyId::new("urn:example:policy:permit")]
        );
    }
}
