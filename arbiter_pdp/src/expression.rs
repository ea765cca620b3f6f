//! Expression evaluation.
//!
//! Evaluates the expression tree against one request. A failed evaluation
//! is not an error type: it is a [`Status`] the caller folds into an
//! indeterminate decision.

use std::collections::HashMap;

use arbiter_core::expression::{AttributeDesignator, AttributeSelector, Expression};
use arbiter_core::policy::VariableDefinition;
use arbiter_core::request::Request;
use arbiter_core::response::Status;
use arbiter_core::value::{Bag, Value};

use crate::config::EngineConfig;
use crate::function::{invoke_checked, FunctionRegistry, Operand};
use crate::types::parse_value;

/// Per-evaluation state: the request, the collaborators, and the variable
/// scope of the enclosing policy.
///
/// Variable results are memoized for the lifetime of the context, which the
/// engine scopes to a single policy evaluation. The context is confined to
/// one evaluation and never shared.
pub struct EvaluationContext<'a> {
    request: &'a Request,
    config: &'a EngineConfig,
    variables: HashMap<&'a str, &'a Expression>,
    memo: HashMap<String, Result<Operand, Status>>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context with no variables in scope.
    pub fn new(request: &'a Request, config: &'a EngineConfig) -> Self {
        Self::with_variables(request, config, &[])
    }

    /// Create a context with the given variable definitions in scope.
    pub fn with_variables(
        request: &'a Request,
        config: &'a EngineConfig,
        definitions: &'a [VariableDefinition],
    ) -> Self {
        let variables = definitions
            .iter()
            .map(|definition| (definition.id.as_str(), &definition.expression))
            .collect();
        Self {
            request,
            config,
            variables,
            memo: HashMap::new(),
        }
    }

    /// The request under evaluation.
    pub fn request(&self) -> &Request {
        self.request
    }

    /// The function registry in effect.
    pub fn functions(&self) -> &dyn FunctionRegistry {
        self.config.functions()
    }

    /// Evaluate an expression to a value, bag or function reference.
    pub fn evaluate(&mut self, expression: &Expression) -> Result<Operand, Status> {
        match expression {
            Expression::Value(value) => Ok(Operand::Value(value.clone())),
            Expression::Function(id) => Ok(Operand::Function(id.clone())),
            Expression::Designator(designator) => {
                self.resolve_designator(designator).map(Operand::Bag)
            }
            Expression::Selector(selector) => self.resolve_selector(selector).map(Operand::Bag),
            Expression::VariableReference(name) => self.evaluate_variable(name),
            Expression::Apply {
                function,
                parameters,
            } => {
                // Parameters are evaluated in order; the first failure
                // becomes the result of the whole application.
                let mut arguments = Vec::with_capacity(parameters.len());
                for parameter in parameters {
                    arguments.push(self.evaluate(parameter)?);
                }
                invoke_checked(self.config.functions(), function, &arguments)
                    .map_err(|error| error.status())
            }
        }
    }

    /// Evaluate a rule condition, which must produce a single boolean.
    pub fn evaluate_condition(&mut self, expression: &Expression) -> Result<bool, Status> {
        match self.evaluate(expression)? {
            Operand::Value(Value::Boolean(holds)) => Ok(holds),
            other => Err(Status::syntax_error(format!(
                "condition evaluated to a {} instead of a single boolean",
                other.kind()
            ))),
        }
    }

    fn evaluate_variable(&mut self, name: &str) -> Result<Operand, Status> {
        if let Some(result) = self.memo.get(name) {
            return result.clone();
        }
        let expression = match self.variables.get(name) {
            Some(expression) => *expression,
            // Unreachable for policies built through `Policy::new`, which
            // rejects unresolved names at construction.
            None => {
                return Err(Status::syntax_error(format!(
                    "variable '{name}' is not defined"
                )))
            }
        };
        let result = self.evaluate(expression);
        self.memo.insert(name.to_string(), result.clone());
        result
    }

    /// Resolve a designator to a bag of request attribute values.
    pub fn resolve_designator(
        &mut self,
        designator: &AttributeDesignator,
    ) -> Result<Bag, Status> {
        let bag = self.request.bag(
            &designator.category,
            &designator.attribute_id,
            &designator.data_type,
            designator.issuer.as_deref(),
        );
        if bag.is_empty() && designator.must_be_present {
            return Err(Status::missing_attribute(format!(
                "required attribute {} of type {} is missing from category {}",
                designator.attribute_id, designator.data_type, designator.category
            )));
        }
        Ok(bag)
    }

    /// Resolve a selector to a bag of values selected from request content.
    pub fn resolve_selector(&mut self, selector: &AttributeSelector) -> Result<Bag, Status> {
        let mut bag = Bag::empty(selector.data_type.clone());
        if let Some(content) = self.request.content(&selector.category) {
            let context_node = match &selector.context_selector_id {
                Some(attribute_id) => {
                    let context_bag = self.request.bag(
                        &selector.category,
                        attribute_id,
                        &arbiter_core::id::DataType::string(),
                        None,
                    );
                    match context_bag.one_and_only() {
                        Some(Value::String(node)) => Some(node.clone()),
                        _ => {
                            return Err(Status::processing_error(format!(
                                "context selector {attribute_id} did not resolve to a single string"
                            )))
                        }
                    }
                }
                None => None,
            };
            let selected = self
                .config
                .xpath()
                .select(content, context_node.as_deref(), &selector.path)
                .map_err(|error| {
                    Status::processing_error(format!(
                        "selector '{}' failed: {error}",
                        selector.path
                    ))
                })?;
            for lexical in selected {
                let value = parse_value(&selector.data_type, &lexical).map_err(|error| {
                    Status::syntax_error(format!("selector '{}': {error}", selector.path))
                })?;
                bag.push(value);
            }
        }
        if bag.is_empty() && selector.must_be_present {
            return Err(Status::missing_attribute(format!(
                "required selection '{}' produced no values in category {}",
                selector.path, selector.category
            )));
        }
        Ok(bag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::id::{AttributeId, Category, DataType};
    use arbiter_core::response::StatusCode;
    use arbiter_core::value::Value;

    use crate::xpath::{XPathError, XPathResolver};
    use std::sync::Arc;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn request() -> Request {
        Request::new()
            .with_attribute(Category::Subject, "urn:example:attr:role", Value::from("admin"))
            .with_attribute(
                Category::Resource,
                AttributeId::resource_id(),
                Value::from("doc1"),
            )
    }

    fn role_designator() -> AttributeDesignator {
        AttributeDesignator::new(
            Category::Subject,
            AttributeId::new("urn:example:attr:role"),
            DataType::string(),
        )
    }

    #[test]
    fn test_literal_evaluates_to_itself() {
        let request = request();
        let config = config();
        let mut ctx = EvaluationContext::new(&request, &config);
        let result = ctx.evaluate(&Expression::integer(9)).unwrap();
        assert_eq!(result, Operand::Value(Value::Integer(9)));
    }

    #[test]
    fn test_designator_resolves_to_bag() {
        let request = request();
        let config = config();
        let mut ctx = EvaluationContext::new(&request, &config);
        let result = ctx
            .evaluate(&Expression::Designator(role_designator()))
            .unwrap();
        match result {
            Operand::Bag(bag) => assert_eq!(bag.values(), &[Value::from("admin")]),
            other => panic!("expected a bag, got {other:?}"),
        }
    }

    #[test]
    fn test_required_missing_designator_is_missing_attribute() {
        let request = request();
        let config = config();
        let mut ctx = EvaluationContext::new(&request, &config);
        let designator = AttributeDesignator::new(
            Category::Subject,
            AttributeId::new("urn:example:attr:clearance"),
            DataType::string(),
        )
        .required();
        let status = ctx
            .evaluate(&Expression::Designator(designator))
            .unwrap_err();
        assert_eq!(status.code, StatusCode::MissingAttribute);
    }

    #[test]
    fn test_optional_missing_designator_is_empty_bag() {
        let request = request();
        let config = config();
        let mut ctx = EvaluationContext::new(&request, &config);
        let designator = AttributeDesignator::new(
            Category::Subject,
            AttributeId::new("urn:example:attr:clearance"),
            DataType::string(),
        );
        let result = ctx.evaluate(&Expression::Designator(designator)).unwrap();
        match result {
            Operand::Bag(bag) => assert!(bag.is_empty()),
            other => panic!("expected a bag, got {other:?}"),
        }
    }

    #[test]
    fn test_apply_propagates_first_parameter_error() {
        let request = request();
        let config = config();
        let mut ctx = EvaluationContext::new(&request, &config);
        let expression = Expression::apply(
            "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            vec![
                Expression::Designator(
                    AttributeDesignator::new(
                        Category::Subject,
                        AttributeId::new("urn:example:attr:missing"),
                        DataType::string(),
                    )
                    .required(),
                ),
                Expression::string("x"),
            ],
        );
        let status = ctx.evaluate(&expression).unwrap_err();
        assert_eq!(status.code, StatusCode::MissingAttribute);
    }

    #[test]
    fn test_apply_dispatches_to_registry() {
        let request = request();
        let config = config();
        let mut ctx = EvaluationContext::new(&request, &config);
        let expression = Expression::apply(
            "urn:oasis:names:tc:xacml:1.0:function:string-is-in",
            vec![
                Expression::string("admin"),
                Expression::Designator(role_designator()),
            ],
        );
        assert!(ctx.evaluate_condition(&expression).unwrap());
    }

    #[test]
    fn test_unknown_function_is_syntax_error() {
        let request = request();
        let config = config();
        let mut ctx = EvaluationContext::new(&request, &config);
        let expression = Expression::apply("urn:example:function:nope", vec![]);
        let status = ctx.evaluate(&expression).unwrap_err();
        assert_eq!(status.code, StatusCode::SyntaxError);
    }

    #[test]
    fn test_non_boolean_condition_is_syntax_error() {
        let request = request();
        let config = config();
        let mut ctx = EvaluationContext::new(&request, &config);
        let status = ctx
            .evaluate_condition(&Expression::integer(3))
            .unwrap_err();
        assert_eq!(status.code, StatusCode::SyntaxError);
    }

    #[test]
    fn test_variable_memoization() {
        let request = request();
        let config = config();
        let definitions = vec![VariableDefinition::new(
            "is-admin",
            Expression::apply(
                "urn:oasis:names:tc:xacml:1.0:function:string-is-in",
                vec![
                    Expression::string("admin"),
                    Expression::Designator(role_designator()),
                ],
            ),
        )];
        let mut ctx = EvaluationContext::with_variables(&request, &config, &definitions);
        let reference = Expression::VariableReference("is-admin".to_string());
        assert!(ctx.evaluate_condition(&reference).unwrap());
        // Second lookup is served from the memo.
        assert!(ctx.memo.contains_key("is-admin"));
        assert!(ctx.evaluate_condition(&reference).unwrap());
    }

    struct FixedResolver(Vec<String>);

    impl XPathResolver for FixedResolver {
        fn select(
            &self,
            _content: &str,
            _context_node: Option<&str>,
            _path: &str,
        ) -> Result<Vec<String>, XPathError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_selector_parses_selected_nodes() {
        let request = Request::new().with_content(Category::Resource, "<doc owner='alice'/>");
        let config = EngineConfig::new(
            Arc::new(crate::function::InMemoryFunctionRegistry::with_builtins()),
            Arc::new(FixedResolver(vec!["alice".to_string()])),
        );
        let mut ctx = EvaluationContext::new(&request, &config);
        let selector = AttributeSelector {
            category: Category::Resource,
            path: "//@owner".to_string(),
            data_type: DataType::string(),
            context_selector_id: None,
            must_be_present: true,
        };
        let bag = ctx.resolve_selector(&selector).unwrap();
        assert_eq!(bag.values(), &[Value::from("alice")]);
    }

    #[test]
    fn test_required_selector_with_no_content_is_missing_attribute() {
        let request = request();
        let config = config();
        let mut ctx = EvaluationContext::new(&request, &config);
        let selector = AttributeSelector {
            category: Category::Resource,
            path: "//@owner".to_string(),
            data_type: DataType::string(),
            context_selector_id: None,
            must_be_present: true,
        };
        let status = ctx.resolve_selector(&selector).unwrap_err();
        assert_eq!(status.code, StatusCode::MissingAttribute);
    }
}
