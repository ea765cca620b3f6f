//! Built-in standard functions.
//!
//! This is a working subset of the standard catalog: logical connectives,
//! typed equality, arithmetic, comparisons, string operations and bag
//! functions. Hosts register further functions through
//! [`InMemoryFunctionRegistry::register`].

use std::cmp::Ordering;
use std::sync::Arc;

use regex::Regex;

use arbiter_core::id::{DataType, FunctionId};
use arbiter_core::value::{Bag, Value};

use super::{
    invoke_checked, Arity, FunctionError, FunctionRegistry, InMemoryFunctionRegistry, Operand,
    PolicyFunction,
};
use crate::types::compare_values;

const FN1: &str = "urn:oasis:names:tc:xacml:1.0:function:";
const FN2: &str = "urn:oasis:names:tc:xacml:2.0:function:";
const FN3: &str = "urn:oasis:names:tc:xacml:3.0:function:";

type ApplyFn =
    Box<dyn Fn(&FunctionId, &[Operand], &dyn FunctionRegistry) -> Result<Operand, FunctionError> + Send + Sync>;

struct Builtin {
    id: FunctionId,
    arity: Arity,
    apply: ApplyFn,
}

impl PolicyFunction for Builtin {
    fn arity(&self) -> Arity {
        self.arity
    }

    fn invoke(
        &self,
        arguments: &[Operand],
        registry: &dyn FunctionRegistry,
    ) -> Result<Operand, FunctionError> {
        (self.apply)(&self.id, arguments, registry)
    }
}

fn register(
    registry: &InMemoryFunctionRegistry,
    id: &str,
    arity: Arity,
    apply: impl Fn(&FunctionId, &[Operand], &dyn FunctionRegistry) -> Result<Operand, FunctionError>
        + Send
        + Sync
        + 'static,
) {
    let id = FunctionId::new(id);
    registry.register(
        id.clone(),
        Arc::new(Builtin {
            id,
            arity,
            apply: Box::new(apply),
        }),
    );
}

fn value_arg<'a>(
    function: &FunctionId,
    arguments: &'a [Operand],
    index: usize,
) -> Result<&'a Value, FunctionError> {
    arguments[index]
        .as_value()
        .ok_or_else(|| FunctionError::TypeMismatch {
            function: function.clone(),
            message: format!(
                "argument {} must be a single value, got a {}",
                index,
                arguments[index].kind()
            ),
        })
}

fn bag_arg<'a>(
    function: &FunctionId,
    arguments: &'a [Operand],
    index: usize,
) -> Result<&'a Bag, FunctionError> {
    arguments[index]
        .as_bag()
        .ok_or_else(|| FunctionError::TypeMismatch {
            function: function.clone(),
            message: format!(
                "argument {} must be a bag, got a {}",
                index,
                arguments[index].kind()
            ),
        })
}

fn boolean_arg(
    function: &FunctionId,
    arguments: &[Operand],
    index: usize,
) -> Result<bool, FunctionError> {
    value_arg(function, arguments, index)?
        .as_boolean()
        .ok_or_else(|| FunctionError::TypeMismatch {
            function: function.clone(),
            message: format!("argument {index} must be a boolean"),
        })
}

fn integer_arg(
    function: &FunctionId,
    arguments: &[Operand],
    index: usize,
) -> Result<i64, FunctionError> {
    value_arg(function, arguments, index)?
        .as_integer()
        .ok_or_else(|| FunctionError::TypeMismatch {
            function: function.clone(),
            message: format!("argument {index} must be an integer"),
        })
}

fn double_arg(
    function: &FunctionId,
    arguments: &[Operand],
    index: usize,
) -> Result<f64, FunctionError> {
    value_arg(function, arguments, index)?
        .as_double()
        .ok_or_else(|| FunctionError::TypeMismatch {
            function: function.clone(),
            message: format!("argument {index} must be a double"),
        })
}

fn string_arg<'a>(
    function: &FunctionId,
    arguments: &'a [Operand],
    index: usize,
) -> Result<&'a str, FunctionError> {
    value_arg(function, arguments, index)?
        .as_string()
        .ok_or_else(|| FunctionError::TypeMismatch {
            function: function.clone(),
            message: format!("argument {index} must be a string"),
        })
}

fn function_arg<'a>(
    function: &FunctionId,
    arguments: &'a [Operand],
    index: usize,
) -> Result<&'a FunctionId, FunctionError> {
    match &arguments[index] {
        Operand::Function(id) => Ok(id),
        other => Err(FunctionError::TypeMismatch {
            function: function.clone(),
            message: format!(
                "argument {} must be a function reference, got a {}",
                index,
                other.kind()
            ),
        }),
    }
}

/// Typed equality over two values of the same data type.
fn equal_apply(
    function: &FunctionId,
    arguments: &[Operand],
    _registry: &dyn FunctionRegistry,
) -> Result<Operand, FunctionError> {
    let a = value_arg(function, arguments, 0)?;
    let b = value_arg(function, arguments, 1)?;
    if a.data_type() != b.data_type() {
        return Err(FunctionError::TypeMismatch {
            function: function.clone(),
            message: format!("cannot compare {} with {}", a.data_type(), b.data_type()),
        });
    }
    Ok(Operand::boolean(a == b))
}

fn register_compare(registry: &InMemoryFunctionRegistry, id: &str, test: fn(Ordering) -> bool) {
    register(registry, id, Arity::Exact(2), move |function, arguments, _| {
        let a = value_arg(function, arguments, 0)?;
        let b = value_arg(function, arguments, 1)?;
        match compare_values(a, b) {
            Some(ordering) => Ok(Operand::boolean(test(ordering))),
            None => Err(FunctionError::TypeMismatch {
                function: function.clone(),
                message: format!("cannot order {} against {}", a.data_type(), b.data_type()),
            }),
        }
    });
}

fn register_comparison_family(registry: &InMemoryFunctionRegistry, type_name: &str) {
    register_compare(
        registry,
        &format!("{FN1}{type_name}-greater-than"),
        |o| o == Ordering::Greater,
    );
    register_compare(
        registry,
        &format!("{FN1}{type_name}-greater-than-or-equal"),
        |o| o != Ordering::Less,
    );
    register_compare(registry, &format!("{FN1}{type_name}-less-than"), |o| {
        o == Ordering::Less
    });
    register_compare(
        registry,
        &format!("{FN1}{type_name}-less-than-or-equal"),
        |o| o != Ordering::Greater,
    );
}

fn register_bag_family(registry: &InMemoryFunctionRegistry, type_name: &str, data_type: DataType) {
    register(
        registry,
        &format!("{FN1}{type_name}-one-and-only"),
        Arity::Exact(1),
        |function, arguments, _| {
            let bag = bag_arg(function, arguments, 0)?;
            bag.one_and_only()
                .map(|value| Operand::Value(value.clone()))
                .ok_or_else(|| FunctionError::Processing {
                    function: function.clone(),
                    message: format!("expected a bag with exactly one value, got {}", bag.len()),
                })
        },
    );
    register(
        registry,
        &format!("{FN1}{type_name}-bag-size"),
        Arity::Exact(1),
        |function, arguments, _| {
            let bag = bag_arg(function, arguments, 0)?;
            Ok(Operand::Value(Value::Integer(bag.len() as i64)))
        },
    );
    register(
        registry,
        &format!("{FN1}{type_name}-is-in"),
        Arity::Exact(2),
        |function, arguments, _| {
            let value = value_arg(function, arguments, 0)?;
            let bag = bag_arg(function, arguments, 1)?;
            Ok(Operand::boolean(bag.contains(value)))
        },
    );
    register(
        registry,
        &format!("{FN1}{type_name}-bag"),
        Arity::AtLeast(0),
        move |function, arguments, _| {
            let mut bag = Bag::empty(data_type.clone());
            for index in 0..arguments.len() {
                let value = value_arg(function, arguments, index)?;
                if value.data_type() != data_type {
                    return Err(FunctionError::TypeMismatch {
                        function: function.clone(),
                        message: format!(
                            "argument {} has type {}, expected {}",
                            index,
                            value.data_type(),
                            data_type
                        ),
                    });
                }
                bag.push(value.clone());
            }
            Ok(Operand::Bag(bag))
        },
    );
}

/// Apply `function(value, element)` over the elements of a bag.
fn quantifier_apply(
    any: bool,
    function: &FunctionId,
    arguments: &[Operand],
    registry: &dyn FunctionRegistry,
) -> Result<Operand, FunctionError> {
    let inner = function_arg(function, arguments, 0)?;
    let value = value_arg(function, arguments, 1)?;
    let bag = bag_arg(function, arguments, 2)?;
    for element in bag.values() {
        let result = invoke_checked(
            registry,
            inner,
            &[
                Operand::Value(value.clone()),
                Operand::Value(element.clone()),
            ],
        )?;
        let holds = result
            .as_value()
            .and_then(Value::as_boolean)
            .ok_or_else(|| FunctionError::TypeMismatch {
                function: function.clone(),
                message: format!("{inner} did not return a boolean"),
            })?;
        if holds == any {
            return Ok(Operand::boolean(any));
        }
    }
    Ok(Operand::boolean(!any))
}

/// Register every built-in function.
pub fn register_all(registry: &InMemoryFunctionRegistry) {
    // Typed equality
    for type_name in [
        "string", "boolean", "integer", "double", "date", "time", "dateTime", "anyURI",
        "x500Name", "rfc822Name", "hexBinary", "base64Binary", "dayTimeDuration",
        "yearMonthDuration",
    ] {
        register(
            registry,
            &format!("{FN1}{type_name}-equal"),
            Arity::Exact(2),
            equal_apply,
        );
    }
    register(
        registry,
        &format!("{FN3}string-equal-ignore-case"),
        Arity::Exact(2),
        |function, arguments, _| {
            let a = string_arg(function, arguments, 0)?;
            let b = string_arg(function, arguments, 1)?;
            Ok(Operand::boolean(a.eq_ignore_ascii_case(b)))
        },
    );

    // Logical connectives. Parameters are already evaluated by the time a
    // function is dispatched, so these do not short-circuit.
    register(
        registry,
        &format!("{FN1}and"),
        Arity::AtLeast(0),
        |function, arguments, _| {
            for index in 0..arguments.len() {
                if !boolean_arg(function, arguments, index)? {
                    return Ok(Operand::boolean(false));
                }
            }
            Ok(Operand::boolean(true))
        },
    );
    register(
        registry,
        &format!("{FN1}or"),
        Arity::AtLeast(0),
        |function, arguments, _| {
            for index in 0..arguments.len() {
                if boolean_arg(function, arguments, index)? {
                    return Ok(Operand::boolean(true));
                }
            }
            Ok(Operand::boolean(false))
        },
    );
    register(
        registry,
        &format!("{FN1}not"),
        Arity::Exact(1),
        |function, arguments, _| Ok(Operand::boolean(!boolean_arg(function, arguments, 0)?)),
    );
    register(
        registry,
        &format!("{FN1}n-of"),
        Arity::AtLeast(1),
        |function, arguments, _| {
            let required = integer_arg(function, arguments, 0)?;
            let available = (arguments.len() - 1) as i64;
            if required > available {
                return Err(FunctionError::Processing {
                    function: function.clone(),
                    message: format!("{required} of {available} arguments required"),
                });
            }
            let mut satisfied = 0i64;
            for index in 1..arguments.len() {
                if boolean_arg(function, arguments, index)? {
                    satisfied += 1;
                }
            }
            Ok(Operand::boolean(satisfied >= required))
        },
    );

    // Integer arithmetic
    register(
        registry,
        &format!("{FN1}integer-add"),
        Arity::AtLeast(2),
        |function, arguments, _| {
            let mut sum = 0i64;
            for index in 0..arguments.len() {
                sum = sum
                    .checked_add(integer_arg(function, arguments, index)?)
                    .ok_or_else(|| FunctionError::Processing {
                        function: function.clone(),
                        message: "integer overflow".to_string(),
                    })?;
            }
            Ok(Operand::Value(Value::Integer(sum)))
        },
    );
    register(
        registry,
        &format!("{FN1}integer-subtract"),
        Arity::Exact(2),
        |function, arguments, _| {
            let a = integer_arg(function, arguments, 0)?;
            let b = integer_arg(function, arguments, 1)?;
            a.checked_sub(b)
                .map(|v| Operand::Value(Value::Integer(v)))
                .ok_or_else(|| FunctionError::Processing {
                    function: function.clone(),
                    message: "integer overflow".to_string(),
                })
        },
    );
    register(
        registry,
        &format!("{FN1}integer-multiply"),
        Arity::AtLeast(2),
        |function, arguments, _| {
            let mut product = 1i64;
            for index in 0..arguments.len() {
                product = product
                    .checked_mul(integer_arg(function, arguments, index)?)
                    .ok_or_else(|| FunctionError::Processing {
                        function: function.clone(),
                        message: "integer overflow".to_string(),
                    })?;
            }
            Ok(Operand::Value(Value::Integer(product)))
        },
    );
    register(
        registry,
        &format!("{FN1}integer-divide"),
        Arity::Exact(2),
        |function, arguments, _| {
            let a = integer_arg(function, arguments, 0)?;
            let b = integer_arg(function, arguments, 1)?;
            if b == 0 {
                return Err(FunctionError::Processing {
                    function: function.clone(),
                    message: "division by zero".to_string(),
                });
            }
            Ok(Operand::Value(Value::Integer(a / b)))
        },
    );
    register(
        registry,
        &format!("{FN1}integer-mod"),
        Arity::Exact(2),
        |function, arguments, _| {
            let a = integer_arg(function, arguments, 0)?;
            let b = integer_arg(function, arguments, 1)?;
            if b == 0 {
                return Err(FunctionError::Processing {
                    function: function.clone(),
                    message: "division by zero".to_string(),
                });
            }
            Ok(Operand::Value(Value::Integer(a % b)))
        },
    );
    register(
        registry,
        &format!("{FN1}integer-abs"),
        Arity::Exact(1),
        |function, arguments, _| {
            let a = integer_arg(function, arguments, 0)?;
            Ok(Operand::Value(Value::Integer(a.abs())))
        },
    );

    // Double arithmetic
    register(
        registry,
        &format!("{FN1}double-add"),
        Arity::AtLeast(2),
        |function, arguments, _| {
            let mut sum = 0f64;
            for index in 0..arguments.len() {
                sum += double_arg(function, arguments, index)?;
            }
            Ok(Operand::Value(Value::Double(sum)))
        },
    );
    register(
        registry,
        &format!("{FN1}double-subtract"),
        Arity::Exact(2),
        |function, arguments, _| {
            let a = double_arg(function, arguments, 0)?;
            let b = double_arg(function, arguments, 1)?;
            Ok(Operand::Value(Value::Double(a - b)))
        },
    );
    register(
        registry,
        &format!("{FN1}double-multiply"),
        Arity::AtLeast(2),
        |function, arguments, _| {
            let mut product = 1f64;
            for index in 0..arguments.len() {
                product *= double_arg(function, arguments, index)?;
            }
            Ok(Operand::Value(Value::Double(product)))
        },
    );
    register(
        registry,
        &format!("{FN1}double-divide"),
        Arity::Exact(2),
        |function, arguments, _| {
            let a = double_arg(function, arguments, 0)?;
            let b = double_arg(function, arguments, 1)?;
            if b == 0.0 {
                return Err(FunctionError::Processing {
                    function: function.clone(),
                    message: "division by zero".to_string(),
                });
            }
            Ok(Operand::Value(Value::Double(a / b)))
        },
    );

    // Comparisons
    for type_name in ["integer", "double", "string", "date", "time", "dateTime"] {
        register_comparison_family(registry, type_name);
    }

    // String operations
    register(
        registry,
        &format!("{FN2}string-concatenate"),
        Arity::AtLeast(2),
        |function, arguments, _| {
            let mut out = String::new();
            for index in 0..arguments.len() {
                out.push_str(string_arg(function, arguments, index)?);
            }
            Ok(Operand::Value(Value::String(out)))
        },
    );
    register(
        registry,
        &format!("{FN3}string-starts-with"),
        Arity::Exact(2),
        |function, arguments, _| {
            let prefix = string_arg(function, arguments, 0)?;
            let subject = string_arg(function, arguments, 1)?;
            Ok(Operand::boolean(subject.starts_with(prefix)))
        },
    );
    register(
        registry,
        &format!("{FN3}string-ends-with"),
        Arity::Exact(2),
        |function, arguments, _| {
            let suffix = string_arg(function, arguments, 0)?;
            let subject = string_arg(function, arguments, 1)?;
            Ok(Operand::boolean(subject.ends_with(suffix)))
        },
    );
    register(
        registry,
        &format!("{FN3}string-contains"),
        Arity::Exact(2),
        |function, arguments, _| {
            let needle = string_arg(function, arguments, 0)?;
            let subject = string_arg(function, arguments, 1)?;
            Ok(Operand::boolean(subject.contains(needle)))
        },
    );
    register(
        registry,
        &format!("{FN1}string-regexp-match"),
        Arity::Exact(2),
        |function, arguments, _| {
            let pattern = string_arg(function, arguments, 0)?;
            let subject = string_arg(function, arguments, 1)?;
            let regex = Regex::new(pattern).map_err(|e| FunctionError::Processing {
                function: function.clone(),
                message: format!("invalid regular expression: {e}"),
            })?;
            Ok(Operand::boolean(regex.is_match(subject)))
        },
    );

    // Bag functions
    for (type_name, data_type) in [
        ("string", DataType::string()),
        ("boolean", DataType::boolean()),
        ("integer", DataType::integer()),
        ("double", DataType::double()),
        ("date", DataType::date()),
        ("time", DataType::time()),
        ("dateTime", DataType::date_time()),
        ("anyURI", DataType::any_uri()),
    ] {
        register_bag_family(registry, type_name, data_type);
    }

    // Higher-order quantifiers
    for prefix in [FN1, FN3] {
        register(
            registry,
            &format!("{prefix}any-of"),
            Arity::Exact(3),
            |function, arguments, registry| quantifier_apply(true, function, arguments, registry),
        );
        register(
            registry,
            &format!("{prefix}all-of"),
            Arity::Exact(3),
            |function, arguments, registry| quantifier_apply(false, function, arguments, registry),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> InMemoryFunctionRegistry {
        InMemoryFunctionRegistry::with_builtins()
    }

    fn call(name: &str, arguments: &[Operand]) -> Result<Operand, FunctionError> {
        invoke_checked(&registry(), &FunctionId::new(name), arguments)
    }

    fn string(value: &str) -> Operand {
        Operand::Value(Value::from(value))
    }

    fn integer(value: i64) -> Operand {
        Operand::Value(Value::Integer(value))
    }

    #[test]
    fn test_string_equal() {
        let result = call(
            "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            &[string("a"), string("a")],
        )
        .unwrap();
        assert_eq!(result, Operand::boolean(true));
    }

    #[test]
    fn test_equal_rejects_mixed_types() {
        let result = call(
            "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            &[string("1"), integer(1)],
        );
        assert!(matches!(result, Err(FunctionError::TypeMismatch { .. })));
    }

    #[test]
    fn test_logical_connectives() {
        let and = "urn:oasis:names:tc:xacml:1.0:function:and";
        let or = "urn:oasis:names:tc:xacml:1.0:function:or";
        let not = "urn:oasis:names:tc:xacml:1.0:function:not";
        assert_eq!(call(and, &[]).unwrap(), Operand::boolean(true));
        assert_eq!(
            call(and, &[Operand::boolean(true), Operand::boolean(false)]).unwrap(),
            Operand::boolean(false)
        );
        assert_eq!(call(or, &[]).unwrap(), Operand::boolean(false));
        assert_eq!(
            call(or, &[Operand::boolean(false), Operand::boolean(true)]).unwrap(),
            Operand::boolean(true)
        );
        assert_eq!(
            call(not, &[Operand::boolean(false)]).unwrap(),
            Operand::boolean(true)
        );
    }

    #[test]
    fn test_n_of() {
        let n_of = "urn:oasis:names:tc:xacml:1.0:function:n-of";
        assert_eq!(
            call(
                n_of,
                &[integer(2), Operand::boolean(true), Operand::boolean(true), Operand::boolean(false)]
            )
            .unwrap(),
            Operand::boolean(true)
        );
        assert!(matches!(
            call(n_of, &[integer(3), Operand::boolean(true)]),
            Err(FunctionError::Processing { .. })
        ));
    }

    #[test]
    fn test_integer_divide_by_zero() {
        let result = call(
            "urn:oasis:names:tc:xacml:1.0:function:integer-divide",
            &[integer(10), integer(0)],
        );
        assert!(matches!(result, Err(FunctionError::Processing { .. })));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            call(
                "urn:oasis:names:tc:xacml:1.0:function:integer-less-than",
                &[integer(1), integer(2)]
            )
            .unwrap(),
            Operand::boolean(true)
        );
        assert_eq!(
            call(
                "urn:oasis:names:tc:xacml:1.0:function:string-greater-than-or-equal",
                &[string("b"), string("b")]
            )
            .unwrap(),
            Operand::boolean(true)
        );
    }

    #[test]
    fn test_regexp_match() {
        let regexp = "urn:oasis:names:tc:xacml:1.0:function:string-regexp-match";
        assert_eq!(
            call(regexp, &[string("^doc[0-9]+$"), string("doc42")]).unwrap(),
            Operand::boolean(true)
        );
        assert!(matches!(
            call(regexp, &[string("("), string("x")]),
            Err(FunctionError::Processing { .. })
        ));
    }

    #[test]
    fn test_bag_functions() {
        let bag = Operand::Bag(Bag::new(
            DataType::string(),
            vec![Value::from("a"), Value::from("b")],
        ));
        assert_eq!(
            call(
                "urn:oasis:names:tc:xacml:1.0:function:string-bag-size",
                &[bag.clone()]
            )
            .unwrap(),
            integer(2)
        );
        assert_eq!(
            call(
                "urn:oasis:names:tc:xacml:1.0:function:string-is-in",
                &[string("a"), bag.clone()]
            )
            .unwrap(),
            Operand::boolean(true)
        );
        assert!(matches!(
            call(
                "urn:oasis:names:tc:xacml:1.0:function:string-one-and-only",
                &[bag]
            ),
            Err(FunctionError::Processing { .. })
        ));
    }

    #[test]
    fn test_any_of_quantifier() {
        let bag = Operand::Bag(Bag::new(
            DataType::string(),
            vec![Value::from("x"), Value::from("admin")],
        ));
        let result = call(
            "urn:oasis:names:tc:xacml:3.0:function:any-of",
            &[
                Operand::Function(FunctionId::new(
                    "urn:oasis:names:tc:xacml:1.0:function:string-equal",
                )),
                string("admin"),
                bag,
            ],
        )
        .unwrap();
        assert_eq!(result, Operand::boolean(true));
    }
}
