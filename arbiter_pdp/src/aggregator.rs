//! Obligation and advice aggregation.
//!
//! Obligation and advice expressions are evaluated only once the node's
//! decision is known, and only those attached to the matching effect are
//! included. A failing assignment expression is never silently dropped: it
//! escalates the node's result to Indeterminate with a processing error.

use arbiter_core::policy::{AdviceExpression, AttributeAssignmentExpression, Effect, ObligationExpression};
use arbiter_core::response::{Advice, AttributeAssignment, Obligation, Status};

use crate::expression::EvaluationContext;
use crate::function::Operand;

/// Evaluate the obligation and advice expressions attached to the given
/// effect.
///
/// Returns the status of the first failing assignment expression, which the
/// caller folds into an indeterminate decision.
pub fn collect_directives(
    ctx: &mut EvaluationContext<'_>,
    effect: Effect,
    obligations: &[ObligationExpression],
    advice: &[AdviceExpression],
) -> Result<(Vec<Obligation>, Vec<Advice>), Status> {
    let mut collected_obligations = Vec::new();
    for expression in obligations.iter().filter(|o| o.fulfill_on == effect) {
        let assignments = evaluate_assignments(ctx, &expression.assignments).map_err(|status| {
            Status::processing_error(format!(
                "obligation {} could not be fulfilled: {}",
                expression.id, status.message
            ))
        })?;
        collected_obligations.push(Obligation {
            id: expression.id.clone(),
            assignments,
        });
    }

    let mut collected_advice = Vec::new();
    for expression in advice.iter().filter(|a| a.applies_to == effect) {
        let assignments = evaluate_assignments(ctx, &expression.assignments).map_err(|status| {
            Status::processing_error(format!(
                "advice {} could not be evaluated: {}",
                expression.id, status.message
            ))
        })?;
        collected_advice.push(Advice {
            id: expression.id.clone(),
            assignments,
        });
    }

    Ok((collected_obligations, collected_advice))
}

fn evaluate_assignments(
    ctx: &mut EvaluationContext<'_>,
    expressions: &[AttributeAssignmentExpression],
) -> Result<Vec<AttributeAssignment>, Status> {
    let mut assignments = Vec::new();
    for expression in expressions {
        match ctx.evaluate(&expression.expression)? {
            Operand::Value(value) => assignments.push(AttributeAssignment {
                attribute_id: expression.attribute_id.clone(),
                category: expression.category.clone(),
                issuer: expression.issuer.clone(),
                value,
            }),
            // A bag-valued assignment contributes one assignment per value.
            Operand::Bag(bag) => {
                for value in bag.values() {
                    assignments.push(AttributeAssignment {
                        attribute_id: expression.attribute_id.clone(),
                        category: expression.category.clone(),
                        issuer: expression.issuer.clone(),
                        value: value.clone(),
                    });
                }
            }
            Operand::Function(id) => {
                return Err(Status::processing_error(format!(
                    "assignment for {} evaluated to the bare function {}",
                    expression.attribute_id, id
                )))
            }
        }
    }
    Ok(assignments)
}
