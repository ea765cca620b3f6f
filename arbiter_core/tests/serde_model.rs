//! The model types round-trip through serde unchanged.

use arbiter_core::expression::{AttributeDesignator, Expression};
use arbiter_core::id::{AttributeId, Category, DataType};
use arbiter_core::policy::{
    Effect, Match, ObligationExpression, Policy, Rule, RuleCombiningAlgorithm, Target,
};
use arbiter_core::request::Request;
use arbiter_core::response::{Decision, IndeterminateKind, Status};
use arbiter_core::value::Value;

#[test]
fn policy_round_trips_through_json() {
    let policy = Policy::new(
        "urn:example:policy:round-trip",
        Target::single(Match::designator(
            "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            Value::from("doc1"),
            AttributeDesignator::new(
                Category::Resource,
                AttributeId::resource_id(),
                DataType::string(),
            ),
        )),
        RuleCombiningAlgorithm::DenyOverrides,
        Vec::new(),
        vec![Rule::new("permit", Effect::Permit)
            .with_condition(Expression::boolean(true))
            .with_obligation(ObligationExpression::new(
                "urn:example:obligation:log",
                Effect::Permit,
            ))],
        Vec::new(),
        Vec::new(),
    )
    .unwrap();

    let encoded = serde_json::to_string(&policy).unwrap();
    let decoded: Policy = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, policy);
}

#[test]
fn request_round_trips_through_json() {
    let request = Request::new()
        .with_attribute(
            Category::Resource,
            AttributeId::resource_id(),
            Value::from("doc1"),
        )
        .with_attribute(Category::Subject, "urn:example:attr:role", Value::from("admin"))
        .with_content(Category::Resource, "<doc owner='alice'/>");

    let encoded = serde_json::to_value(&request).unwrap();
    let decoded: Request = serde_json::from_value(encoded).unwrap();
    assert_eq!(decoded, request);
}

#[test]
fn indeterminate_decision_keeps_its_status() {
    let decision = Decision::indeterminate(
        IndeterminateKind::DenyPermit,
        Status::missing_attribute("no subject-id"),
    );
    let encoded = serde_json::to_string(&decision).unwrap();
    let decoded: Decision = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, decision);
}
