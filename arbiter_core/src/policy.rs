//! The policy tree: rules, policies, policy sets and their targets.
//!
//! The tree is immutable once constructed and carries no interior
//! mutability, so it can be shared read-only across arbitrarily many
//! concurrent evaluations. Variable definitions are validated at
//! construction time; a cyclic or unresolved reference never reaches the
//! evaluator.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};
use crate::expression::{AttributeDesignator, AttributeSelector, Expression};
use crate::id::{AdviceId, AttributeId, Category, FunctionId, ObligationId, PolicyId, PolicySetId, RuleId};
use crate::value::Value;

/// The effect a rule declares, and the effect obligations are attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Permit,
    Deny,
}

/// The source a match clause draws its candidate bag from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchSource {
    Designator(AttributeDesignator),
    Selector(AttributeSelector),
}

/// A single match clause: `match_function(literal, candidate)` must hold for
/// at least one candidate in the resolved bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub function: FunctionId,
    pub literal: Value,
    pub source: MatchSource,
}

impl Match {
    /// Create a match clause over a designator.
    pub fn designator(
        function: impl Into<FunctionId>,
        literal: Value,
        designator: AttributeDesignator,
    ) -> Self {
        Self {
            function: function.into(),
            literal,
            source: MatchSource::Designator(designator),
        }
    }

    /// Create a match clause over a selector.
    pub fn selector(
        function: impl Into<FunctionId>,
        literal: Value,
        selector: AttributeSelector,
    ) -> Self {
        Self {
            function: function.into(),
            literal,
            source: MatchSource::Selector(selector),
        }
    }
}

/// A conjunction of match clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllOf {
    pub matches: Vec<Match>,
}

/// A disjunction of conjunctions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyOf {
    pub all_of: Vec<AllOf>,
}

/// The applicability filter of a rule, policy or policy set.
///
/// Semantics: OR over `AnyOf`, OR over `AllOf`, AND over `Match`. An empty
/// target matches unconditionally.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Target {
    pub any_of: Vec<AnyOf>,
}

impl Target {
    /// The empty target, which matches every request.
    pub fn match_all() -> Self {
        Self::default()
    }

    /// A target with a single match clause.
    pub fn single(clause: Match) -> Self {
        Self {
            any_of: vec![AnyOf {
                all_of: vec![AllOf {
                    matches: vec![clause],
                }],
            }],
        }
    }

    /// Whether this target matches unconditionally.
    pub fn is_empty(&self) -> bool {
        self.any_of.is_empty()
    }
}

/// Computes one attribute of an obligation or advice directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeAssignmentExpression {
    pub attribute_id: AttributeId,
    pub category: Option<Category>,
    pub issuer: Option<String>,
    pub expression: Expression,
}

impl AttributeAssignmentExpression {
    pub fn new(attribute_id: impl Into<AttributeId>, expression: Expression) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            category: None,
            issuer: None,
            expression,
        }
    }
}

/// An unevaluated obligation, attached to the effect that triggers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObligationExpression {
    pub id: ObligationId,
    pub fulfill_on: Effect,
    pub assignments: Vec<AttributeAssignmentExpression>,
}

impl ObligationExpression {
    pub fn new(id: impl Into<ObligationId>, fulfill_on: Effect) -> Self {
        Self {
            id: id.into(),
            fulfill_on,
            assignments: Vec::new(),
        }
    }

    pub fn with_assignment(mut self, assignment: AttributeAssignmentExpression) -> Self {
        self.assignments.push(assignment);
        self
    }
}

/// An unevaluated advice directive, attached to the effect that triggers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceExpression {
    pub id: AdviceId,
    pub applies_to: Effect,
    pub assignments: Vec<AttributeAssignmentExpression>,
}

impl AdviceExpression {
    pub fn new(id: impl Into<AdviceId>, applies_to: Effect) -> Self {
        Self {
            id: id.into(),
            applies_to,
            assignments: Vec::new(),
        }
    }

    pub fn with_assignment(mut self, assignment: AttributeAssignmentExpression) -> Self {
        self.assignments.push(assignment);
        self
    }
}

/// A named sub-expression, resolved by name from rule conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub id: String,
    pub expression: Expression,
}

impl VariableDefinition {
    pub fn new(id: impl Into<String>, expression: Expression) -> Self {
        Self {
            id: id.into(),
            expression,
        }
    }
}

/// A single rule under a policy.
///
/// A rule without a target inherits applicability from the enclosing
/// policy's target and is evaluated for its condition only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub effect: Effect,
    pub description: Option<String>,
    pub target: Option<Target>,
    pub condition: Option<Expression>,
    pub obligations: Vec<ObligationExpression>,
    pub advice: Vec<AdviceExpression>,
}

impl Rule {
    /// Create a rule with no target and no condition.
    pub fn new(id: impl Into<RuleId>, effect: Effect) -> Self {
        Self {
            id: id.into(),
            effect,
            description: None,
            target: None,
            condition: None,
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_condition(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_obligation(mut self, obligation: ObligationExpression) -> Self {
        self.obligations.push(obligation);
        self
    }

    pub fn with_advice(mut self, advice: AdviceExpression) -> Self {
        self.advice.push(advice);
        self
    }
}

/// Algorithm reducing rule decisions under a policy to one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleCombiningAlgorithm {
    DenyOverrides,
    OrderedDenyOverrides,
    PermitOverrides,
    OrderedPermitOverrides,
    FirstApplicable,
    DenyUnlessPermit,
    PermitUnlessDeny,
}

/// Algorithm reducing child decisions under a policy set to one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyCombiningAlgorithm {
    DenyOverrides,
    OrderedDenyOverrides,
    PermitOverrides,
    OrderedPermitOverrides,
    FirstApplicable,
    OnlyOneApplicable,
    DenyUnlessPermit,
    PermitUnlessDeny,
}

/// A policy: an ordered sequence of rules under one combining algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    id: PolicyId,
    description: Option<String>,
    target: Target,
    variables: Vec<VariableDefinition>,
    rules: Vec<Rule>,
    rule_combining: RuleCombiningAlgorithm,
    obligations: Vec<ObligationExpression>,
    advice: Vec<AdviceExpression>,
}

impl Policy {
    /// Create a policy, validating its variable definitions.
    ///
    /// Every variable referenced by a definition, a rule condition or an
    /// assignment expression must be defined, and no definition may
    /// reference itself transitively.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<PolicyId>,
        target: Target,
        rule_combining: RuleCombiningAlgorithm,
        variables: Vec<VariableDefinition>,
        rules: Vec<Rule>,
        obligations: Vec<ObligationExpression>,
        advice: Vec<AdviceExpression>,
    ) -> Result<Self> {
        let policy = Self {
            id: id.into(),
            description: None,
            target,
            variables,
            rules,
            rule_combining,
            obligations,
            advice,
        };
        policy.validate_variables()?;
        Ok(policy)
    }

    /// Create a policy with an empty target and no variables, obligations
    /// or advice.
    pub fn from_rules(
        id: impl Into<PolicyId>,
        rule_combining: RuleCombiningAlgorithm,
        rules: Vec<Rule>,
    ) -> Self {
        Self {
            id: id.into(),
            description: None,
            target: Target::match_all(),
            variables: Vec::new(),
            rules,
            rule_combining,
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> &PolicyId {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn variables(&self) -> &[VariableDefinition] {
        &self.variables
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule_combining(&self) -> RuleCombiningAlgorithm {
        self.rule_combining
    }

    pub fn obligations(&self) -> &[ObligationExpression] {
        &self.obligations
    }

    pub fn advice(&self) -> &[AdviceExpression] {
        &self.advice
    }

    /// Check that every variable reference resolves and no definition is
    /// cyclic.
    fn validate_variables(&self) -> Result<()> {
        let mut definitions: HashMap<&str, &Expression> = HashMap::new();
        for definition in &self.variables {
            if definitions
                .insert(definition.id.as_str(), &definition.expression)
                .is_some()
            {
                return Err(PolicyError::DuplicateVariable(definition.id.clone()).into());
            }
        }

        // Depth-first walk of each definition's references. A name on the
        // visiting stack means the definition reaches itself.
        for definition in &self.variables {
            let mut visiting = HashSet::new();
            Self::check_definition(definition.id.as_str(), &definitions, &mut visiting)?;
        }

        // References from rules and directives must resolve; cycles through
        // them are impossible since they define nothing.
        let mut referenced = Vec::new();
        for rule in &self.rules {
            if let Some(condition) = &rule.condition {
                condition.variable_references(&mut referenced);
            }
            for obligation in &rule.obligations {
                for assignment in &obligation.assignments {
                    assignment.expression.variable_references(&mut referenced);
                }
            }
            for advice in &rule.advice {
                for assignment in &advice.assignments {
                    assignment.expression.variable_references(&mut referenced);
                }
            }
        }
        for obligation in &self.obligations {
            for assignment in &obligation.assignments {
                assignment.expression.variable_references(&mut referenced);
            }
        }
        for advice in &self.advice {
            for assignment in &advice.assignments {
                assignment.expression.variable_references(&mut referenced);
            }
        }
        for name in referenced {
            if !definitions.contains_key(name.as_str()) {
                return Err(PolicyError::UnresolvedVariable(name).into());
            }
        }

        Ok(())
    }

    fn check_definition(
        name: &str,
        definitions: &HashMap<&str, &Expression>,
        visiting: &mut HashSet<String>,
    ) -> Result<()> {
        if !visiting.insert(name.to_string()) {
            return Err(PolicyError::CyclicVariable(name.to_string()).into());
        }
        let expression = definitions
            .get(name)
            .ok_or_else(|| PolicyError::UnresolvedVariable(name.to_string()))?;
        let mut referenced = Vec::new();
        expression.variable_references(&mut referenced);
        for next in referenced {
            Self::check_definition(&next, definitions, visiting)?;
        }
        visiting.remove(name);
        Ok(())
    }
}

/// A child of a policy set: inline or by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PolicySetChild {
    Policy(Policy),
    PolicySet(PolicySet),
    PolicyReference(PolicyId),
    PolicySetReference(PolicySetId),
}

/// A policy set: an ordered sequence of policies, policy sets and
/// references under one combining algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    id: PolicySetId,
    description: Option<String>,
    target: Target,
    children: Vec<PolicySetChild>,
    policy_combining: PolicyCombiningAlgorithm,
    obligations: Vec<ObligationExpression>,
    advice: Vec<AdviceExpression>,
}

impl PolicySet {
    pub fn new(
        id: impl Into<PolicySetId>,
        target: Target,
        policy_combining: PolicyCombiningAlgorithm,
        children: Vec<PolicySetChild>,
    ) -> Self {
        Self {
            id: id.into(),
            description: None,
            target,
            children,
            policy_combining,
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_obligation(mut self, obligation: ObligationExpression) -> Self {
        self.obligations.push(obligation);
        self
    }

    pub fn with_advice(mut self, advice: AdviceExpression) -> Self {
        self.advice.push(advice);
        self
    }

    pub fn id(&self) -> &PolicySetId {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn children(&self) -> &[PolicySetChild] {
        &self.children
    }

    pub fn policy_combining(&self) -> PolicyCombiningAlgorithm {
        self.policy_combining
    }

    pub fn obligations(&self) -> &[ObligationExpression] {
        &self.obligations
    }

    pub fn advice(&self) -> &[AdviceExpression] {
        &self.advice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn var_ref(name: &str) -> Expression {
        Expression::VariableReference(name.to_string())
    }

    #[test]
    fn test_valid_variable_chain_is_accepted() {
        let policy = Policy::new(
            "urn:example:policy:vars",
            Target::match_all(),
            RuleCombiningAlgorithm::DenyOverrides,
            vec![
                VariableDefinition::new("a", Expression::boolean(true)),
                VariableDefinition::new(
                    "b",
                    Expression::apply(
                        "urn:oasis:names:tc:xacml:1.0:function:not",
                        vec![var_ref("a")],
                    ),
                ),
            ],
            vec![Rule::new("rule-1", Effect::Permit).with_condition(var_ref("b"))],
            Vec::new(),
            Vec::new(),
        );
        assert!(policy.is_ok());
    }

    #[test]
    fn test_cyclic_variable_is_rejected_at_construction() {
        let result = Policy::new(
            "urn:example:policy:cycle",
            Target::match_all(),
            RuleCombiningAlgorithm::DenyOverrides,
            vec![
                VariableDefinition::new("a", var_ref("b")),
                VariableDefinition::new("b", var_ref("a")),
            ],
            vec![Rule::new("rule-1", Effect::Permit)],
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(
            result,
            Err(Error::Policy(PolicyError::CyclicVariable(_)))
        ));
    }

    #[test]
    fn test_self_referencing_variable_is_rejected() {
        let result = Policy::new(
            "urn:example:policy:self",
            Target::match_all(),
            RuleCombiningAlgorithm::DenyOverrides,
            vec![VariableDefinition::new("a", var_ref("a"))],
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(
            result,
            Err(Error::Policy(PolicyError::CyclicVariable(_)))
        ));
    }

    #[test]
    fn test_unresolved_condition_reference_is_rejected() {
        let result = Policy::new(
            "urn:example:policy:unresolved",
            Target::match_all(),
            RuleCombiningAlgorithm::DenyOverrides,
            Vec::new(),
            vec![Rule::new("rule-1", Effect::Permit).with_condition(var_ref("missing"))],
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(
            result,
            Err(Error::Policy(PolicyError::UnresolvedVariable(name))) if name == "missing"
        ));
    }

    #[test]
    fn test_duplicate_variable_is_rejected() {
        let result = Policy::new(
            "urn:example:policy:dup",
            Target::match_all(),
            RuleCombiningAlgorithm::DenyOverrides,
            vec![
                VariableDefinition::new("a", Expression::boolean(true)),
                VariableDefinition::new("a", Expression::boolean(false)),
            ],
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(
            result,
            Err(Error::Policy(PolicyError::DuplicateVariable(_)))
        ));
    }
}
