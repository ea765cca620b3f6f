//! Target matching.
//!
//! A target is a disjunction of conjunctions of match clauses. Matching is
//! three-valued: a clause that cannot be resolved yields Indeterminate,
//! which propagates unless a definitive answer short-circuits it — a false
//! clause settles its conjunction, a true conjunction settles its
//! disjunction.

use arbiter_core::policy::{AllOf, AnyOf, Match, MatchSource, Target};
use arbiter_core::response::Status;
use arbiter_core::value::Value;

use crate::expression::EvaluationContext;
use crate::function::{invoke_checked, FunctionError, FunctionRegistry, Operand};

/// The outcome of matching a target against a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Applicability {
    Applicable,
    NotApplicable,
    Indeterminate(Status),
}

/// Match a target against the request in the context.
///
/// An empty target is applicable unconditionally; otherwise the target is
/// applicable iff at least one of its disjuncts is.
pub fn match_target(ctx: &mut EvaluationContext<'_>, target: &Target) -> Applicability {
    if target.is_empty() {
        return Applicability::Applicable;
    }
    or_over(target.any_of.iter(), |disjunct| match_any_of(ctx, disjunct))
}

fn match_any_of(ctx: &mut EvaluationContext<'_>, any_of: &AnyOf) -> Applicability {
    or_over(any_of.all_of.iter(), |conjunct| match_all_of(ctx, conjunct))
}

fn match_all_of(ctx: &mut EvaluationContext<'_>, all_of: &AllOf) -> Applicability {
    let mut pending_error: Option<Status> = None;
    for clause in &all_of.matches {
        match match_clause(ctx, clause) {
            Applicability::Applicable => {}
            // A false clause settles the conjunction regardless of any
            // indeterminate sibling.
            Applicability::NotApplicable => return Applicability::NotApplicable,
            Applicability::Indeterminate(status) => {
                pending_error.get_or_insert(status);
            }
        }
    }
    match pending_error {
        Some(status) => Applicability::Indeterminate(status),
        None => Applicability::Applicable,
    }
}

/// OR with short-circuit on true and error deferral: a true element settles
/// the disjunction regardless of any indeterminate sibling.
fn or_over<T>(
    items: impl Iterator<Item = T>,
    mut matcher: impl FnMut(T) -> Applicability,
) -> Applicability {
    let mut pending_error: Option<Status> = None;
    for item in items {
        match matcher(item) {
            Applicability::Applicable => return Applicability::Applicable,
            Applicability::NotApplicable => {}
            Applicability::Indeterminate(status) => {
                pending_error.get_or_insert(status);
            }
        }
    }
    match pending_error {
        Some(status) => Applicability::Indeterminate(status),
        None => Applicability::NotApplicable,
    }
}

/// Match a single clause: the clause holds iff the resolved bag contains at
/// least one value the match function accepts against the literal.
fn match_clause(ctx: &mut EvaluationContext<'_>, clause: &Match) -> Applicability {
    // An unknown match function is a syntax error even when the candidate
    // bag turns out to be empty.
    if ctx.functions().lookup(&clause.function).is_none() {
        return Applicability::Indeterminate(Status::syntax_error(
            FunctionError::Unknown(clause.function.clone()).to_string(),
        ));
    }

    let bag = match &clause.source {
        MatchSource::Designator(designator) => ctx.resolve_designator(designator),
        MatchSource::Selector(selector) => ctx.resolve_selector(selector),
    };
    let bag = match bag {
        Ok(bag) => bag,
        Err(status) => return Applicability::Indeterminate(status),
    };

    // An empty bag from an optional attribute is a plain no-match.
    let mut pending_error: Option<Status> = None;
    for candidate in bag.values() {
        match apply_match_function(ctx, clause, candidate) {
            Ok(true) => return Applicability::Applicable,
            Ok(false) => {}
            Err(status) => {
                pending_error.get_or_insert(status);
            }
        }
    }
    match pending_error {
        Some(status) => Applicability::Indeterminate(status),
        None => Applicability::NotApplicable,
    }
}

fn apply_match_function(
    ctx: &mut EvaluationContext<'_>,
    clause: &Match,
    candidate: &Value,
) -> Result<bool, Status> {
    let result = invoke_checked(
        ctx.functions(),
        &clause.function,
        &[
            Operand::Value(clause.literal.clone()),
            Operand::Value(candidate.clone()),
        ],
    );
    match result {
        Ok(operand) => operand
            .as_value()
            .and_then(Value::as_boolean)
            .ok_or_else(|| {
                Status::syntax_error(format!(
                    "match function {} did not return a boolean",
                    clause.function
                ))
            }),
        Err(error @ FunctionError::Unknown(_)) => Err(Status::syntax_error(error.to_string())),
        Err(error) => Err(error.status()),
    }
}
