//! AST evaluation.
//!
//! Evaluation is a plain recursive walk; nesting depth is already bounded by
//! the parser. Logical operators short-circuit.

use crate::Real;
use crate::error::{ExprError, Result};
use crate::functions::{
    is_math_namespace, lookup_callable, lookup_constant, lookup_operator, truthy,
};
use crate::types::{AstExpr, LogicalOperator};

/// Evaluates an AST to a raw real (possibly NaN or infinite).
pub fn eval_ast(ast: &AstExpr<'_>) -> Result<Real> {
    match *ast {
        AstExpr::Constant(value) => Ok(value),
        AstExpr::Variable(name) => eval_variable(name),
        AstExpr::Attribute { base, attr } => eval_attribute(base, attr),
        AstExpr::Function {
            name,
            namespace,
            args,
        } => eval_function(name, namespace, args),
        AstExpr::LogicalOp { op, left, right } => {
            let left = truthy(eval_ast(left)?);
            let result = match op {
                LogicalOperator::And => left && truthy(eval_ast(right)?),
                LogicalOperator::Or => left || truthy(eval_ast(right)?),
            };
            Ok(if result { 1.0 } else { 0.0 })
        }
    }
}

fn eval_variable(name: &str) -> Result<Real> {
    if let Some(value) = lookup_constant(name) {
        return Ok(value);
    }
    if lookup_callable(name).is_some() {
        return Err(ExprError::Syntax(format!(
            "Function '{name}' used without arguments"
        )));
    }
    Err(ExprError::UnknownVariable {
        name: name.to_string(),
    })
}

fn eval_attribute(base: &str, attr: &str) -> Result<Real> {
    if is_math_namespace(base) {
        if let Some(value) = lookup_constant(attr) {
            return Ok(value);
        }
    }
    Err(ExprError::UnknownVariable {
        name: format!("{base}.{attr}"),
    })
}

fn eval_function(name: &str, namespace: Option<&str>, args: &[AstExpr<'_>]) -> Result<Real> {
    let entry = match namespace {
        None => lookup_operator(name).or_else(|| lookup_callable(name)),
        Some(ns) if is_math_namespace(ns) => lookup_callable(name),
        Some(_) => None,
    };
    let Some((arity, implementation)) = entry else {
        let name = match namespace {
            Some(ns) => format!("{ns}.{name}"),
            None => name.to_string(),
        };
        return Err(ExprError::UnknownFunction { name });
    };

    if args.len() != arity {
        return Err(ExprError::InvalidFunctionCall {
            name: name.to_string(),
            expected: arity,
            found: args.len(),
        });
    }

    let a = eval_ast(&args[0])?;
    let b = match args.get(1) {
        Some(arg) => eval_ast(arg)?,
        None => 0.0,
    };
    Ok(implementation(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parse_expression;
    use bumpalo::Bump;

    fn eval_str(input: &str) -> Result<Real> {
        let arena = Bump::new();
        let ast = parse_expression(input, &arena)?;
        eval_ast(&ast)
    }

    #[test]
    fn test_short_circuit_skips_failing_operand() {
        // The right operand would fail with UnknownVariable if evaluated
        assert_eq!(eval_str("0 && missing").unwrap(), 0.0);
        assert_eq!(eval_str("1 || missing").unwrap(), 1.0);
        assert!(matches!(
            eval_str("1 && missing"),
            Err(ExprError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_function_used_as_value() {
        assert!(matches!(eval_str("sqrt + 1"), Err(ExprError::Syntax(_))));
    }

    #[test]
    fn test_unknown_attribute() {
        assert!(matches!(
            eval_str("math.tau"),
            Err(ExprError::UnknownVariable { name }) if name == "math.tau"
        ));
        assert!(matches!(
            eval_str("foo.pi"),
            Err(ExprError::UnknownVariable { name }) if name == "foo.pi"
        ));
    }

    #[test]
    fn test_operators_are_not_namespaced() {
        let arena = Bump::new();
        let args = [AstExpr::Constant(1.0), AstExpr::Constant(2.0)];
        let ast = AstExpr::Function {
            name: arena.alloc_str("+"),
            namespace: Some("math"),
            args: &args,
        };
        assert!(matches!(eval_ast(&ast), Err(ExprError::UnknownFunction { .. })));
    }

    #[test]
    fn test_legacy_namespace() {
        assert_eq!(eval_str("Math.sqrt(16)").unwrap(), 4.0);
        assert_eq!(eval_str("Math.pi").unwrap(), crate::constants::PI);
    }

    #[test]
    fn test_nan_is_falsy_in_logic() {
        assert_eq!(eval_str("sqrt(-1) || 0").unwrap(), 0.0);
    }
}
