//! The policy expression tree.
//!
//! Conditions, obligation assignments and match operands are all built from
//! one closed `Expression` union. Keeping the union closed means every
//! evaluator handles every node kind, checked at compile time.

use serde::{Deserialize, Serialize};

use crate::id::{AttributeId, Category, DataType, FunctionId};
use crate::value::Value;

/// Resolves to a bag of attribute values from the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDesignator {
    /// The category to look in.
    pub category: Category,

    /// The attribute to look up.
    pub attribute_id: AttributeId,

    /// The expected data type of the values.
    pub data_type: DataType,

    /// Restrict the lookup to attributes from this issuer.
    pub issuer: Option<String>,

    /// Whether an empty result is an error rather than an empty bag.
    pub must_be_present: bool,
}

impl AttributeDesignator {
    /// Create a designator with no issuer restriction.
    pub fn new(category: Category, attribute_id: AttributeId, data_type: DataType) -> Self {
        Self {
            category,
            attribute_id,
            data_type,
            issuer: None,
            must_be_present: false,
        }
    }

    /// Mark the designated attribute as required.
    pub fn required(mut self) -> Self {
        self.must_be_present = true;
        self
    }
}

/// Resolves to a bag of values selected from request content by path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSelector {
    /// The category whose content is addressed.
    pub category: Category,

    /// The selection path, evaluated by the configured path resolver.
    pub path: String,

    /// The data type the selected nodes are parsed into.
    pub data_type: DataType,

    /// Attribute holding the context node the path is evaluated against.
    pub context_selector_id: Option<AttributeId>,

    /// Whether an empty selection is an error rather than an empty bag.
    pub must_be_present: bool,
}

/// A node in the expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// A typed literal.
    Value(Value),

    /// A function application over ordered parameter expressions.
    Apply {
        function: FunctionId,
        parameters: Vec<Expression>,
    },

    /// A bare function reference, passed as a value to higher-order functions.
    Function(FunctionId),

    /// An attribute lookup against the request.
    Designator(AttributeDesignator),

    /// A content selection against the request.
    Selector(AttributeSelector),

    /// A reference to a named variable defined by the enclosing policy.
    VariableReference(String),
}

impl Expression {
    /// Apply a function to parameters.
    pub fn apply(function: impl Into<FunctionId>, parameters: Vec<Expression>) -> Self {
        Self::Apply {
            function: function.into(),
            parameters,
        }
    }

    /// A string literal expression.
    pub fn string(value: impl Into<String>) -> Self {
        Self::Value(Value::String(value.into()))
    }

    /// A boolean literal expression.
    pub fn boolean(value: bool) -> Self {
        Self::Value(Value::Boolean(value))
    }

    /// An integer literal expression.
    pub fn integer(value: i64) -> Self {
        Self::Value(Value::Integer(value))
    }

    /// Collect the names of every variable referenced in this expression,
    /// recursively.
    pub fn variable_references(&self, names: &mut Vec<String>) {
        match self {
            Self::VariableReference(name) => names.push(name.clone()),
            Self::Apply { parameters, .. } => {
                for parameter in parameters {
                    parameter.variable_references(names);
                }
            }
            Self::Value(_) | Self::Function(_) | Self::Designator(_) | Self::Selector(_) => {}
        }
    }
}
