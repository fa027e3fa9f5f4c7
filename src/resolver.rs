//! Variable substitution and formula evaluation.
//!
//! A formula is evaluated in three steps: [`normalize`], [`substitute`] every
//! referenced variable with its current value, then parse and evaluate the
//! closed arithmetic. A formula of the shape `if(cond, then, else)` is split
//! first; the condition is evaluated and only the selected branch follows.
//! The other branch is never substituted, so it may reference names that do
//! not exist.

use std::sync::LazyLock;

use regex::{Match, Regex};

use crate::Real;
use crate::config::EngineConfig;
use crate::engine::interp_with_limits;
use crate::error::{EngineError, EngineResult, ExprError};
use crate::functions::{CALLABLE_NAMES, is_math_namespace, truthy};
use crate::normalize::normalize;
use crate::variable::VariableSet;

static IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z_]\w*").expect("valid identifier pattern"));

const IF_KEYWORD: &str = "if";

/// Names never treated as variable references, and so never usable as
/// variable names.
pub fn is_reserved(name: &str) -> bool {
    is_math_namespace(name) || CALLABLE_NAMES.contains(&name)
}

/// Identifier matches in `expr` that denote variable references.
///
/// Skipped: reserved names, the member part of a qualified name (`math.pi`)
/// and the `if` keyword when it opens a call.
fn reference_matches(expr: &str) -> impl Iterator<Item = Match<'_>> {
    IDENT.find_iter(expr).filter(move |m| {
        let name = m.as_str();
        if is_reserved(name) {
            return false;
        }
        if expr[..m.start()].ends_with('.') {
            return false;
        }
        if name.eq_ignore_ascii_case(IF_KEYWORD) && expr[m.end()..].trim_start().starts_with('(') {
            return false;
        }
        true
    })
}

/// Distinct variable names referenced by `expr`, in order of first use.
pub fn referenced_names(expr: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for m in reference_matches(expr) {
        if !names.contains(&m.as_str()) {
            names.push(m.as_str());
        }
    }
    names
}

/// True when `expr` references `name` as a whole token.
pub fn references(expr: &str, name: &str) -> bool {
    reference_matches(expr).any(|m| m.as_str() == name)
}

fn substitution_text(value: Real, wrap_negative: bool) -> String {
    if wrap_negative && value.is_sign_negative() && value != 0.0 {
        format!("({value})")
    } else {
        format!("{value}")
    }
}

/// Replaces every variable reference in `expr` with its current value.
///
/// Fails with [`EngineError::MissingVariable`] naming the first referenced
/// name (in order of appearance) that is not in `variables`; in that case no
/// text is produced. Replacement is a single left-to-right pass over whole
/// identifiers, so a name is never matched inside a longer name or inside a
/// value substituted for another name.
///
/// ```
/// use fiche_rs::resolver::substitute;
/// use fiche_rs::variable::{Variable, VariableSet};
///
/// let vars = VariableSet::from_vec(vec![
///     Variable::literal("t", 2.0),
///     Variable::literal("temp", 30.0),
/// ]);
/// assert_eq!(substitute("temp * t", &vars).unwrap(), "30 * 2");
/// assert!(substitute("temp + y", &vars).is_err());
/// ```
pub fn substitute(expr: &str, variables: &VariableSet) -> EngineResult<String> {
    substitute_with(expr, variables, &EngineConfig::default())
}

/// [`substitute`] with explicit configuration.
pub fn substitute_with(
    expr: &str,
    variables: &VariableSet,
    config: &EngineConfig,
) -> EngineResult<String> {
    if let Some(name) = referenced_names(expr)
        .into_iter()
        .find(|name| !variables.contains(name))
    {
        return Err(EngineError::MissingVariable {
            name: name.to_string(),
        });
    }

    let mut out = String::with_capacity(expr.len() + 8);
    let mut last = 0;
    for m in reference_matches(expr) {
        let Some(value) = variables.value(m.as_str()) else {
            continue;
        };
        out.push_str(&expr[last..m.start()]);
        out.push_str(&substitution_text(value, config.wrap_negative_values));
        last = m.end();
    }
    out.push_str(&expr[last..]);
    Ok(out)
}

/// The three parts of an `if(cond, then, else)` formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conditional<'a> {
    pub condition: &'a str,
    pub then_branch: &'a str,
    pub else_branch: &'a str,
}

/// Index of the parenthesis closing the one at `open`, if any.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits `args` at commas that are not nested in parentheses.
///
/// At most three arguments are accepted.
fn split_top_level(args: &str) -> Result<heapless::Vec<&str, 3>, ExprError> {
    let mut parts: heapless::Vec<&str, 3> = heapless::Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts
                    .push(args[start..i].trim())
                    .map_err(|_| ExprError::Syntax("if() takes exactly 3 arguments".into()))?;
                start = i + 1;
            }
            _ => {}
        }
    }
    parts
        .push(args[start..].trim())
        .map_err(|_| ExprError::Syntax("if() takes exactly 3 arguments".into()))?;
    Ok(parts)
}

/// Recognizes a formula that is, as a whole, an `if(...)` call.
///
/// Returns `None` for any other formula (including one where `if(...)` is
/// only part of the text). The keyword is case-insensitive.
pub fn parse_conditional(expr: &str) -> Option<EngineResult<Conditional<'_>>> {
    let trimmed = expr.trim();
    let head = trimmed.get(..IF_KEYWORD.len())?;
    if !head.eq_ignore_ascii_case(IF_KEYWORD) {
        return None;
    }
    let rest = &trimmed[IF_KEYWORD.len()..];
    let open = IF_KEYWORD.len() + (rest.len() - rest.trim_start().len());
    if !trimmed[open..].starts_with('(') {
        return None;
    }
    let close = matching_paren(trimmed, open)?;
    if close != trimmed.len() - 1 {
        return None;
    }

    let parts = match split_top_level(&trimmed[open + 1..close]) {
        Ok(parts) => parts,
        Err(cause) => return Some(Err(EngineError::evaluation(expr, cause))),
    };
    match *parts.as_slice() {
        [condition, then_branch, else_branch]
            if !condition.is_empty() && !then_branch.is_empty() && !else_branch.is_empty() =>
        {
            Some(Ok(Conditional {
                condition,
                then_branch,
                else_branch,
            }))
        }
        _ => Some(Err(EngineError::evaluation(
            expr,
            ExprError::Syntax("if() takes exactly 3 non-empty arguments".into()),
        ))),
    }
}

/// Normalizes, substitutes and evaluates one arithmetic formula.
fn evaluate_arithmetic(
    expr: &str,
    variables: &VariableSet,
    config: &EngineConfig,
) -> EngineResult<Real> {
    let normalized = normalize(expr);
    let substituted = substitute_with(&normalized, variables, config)?;
    interp_with_limits(&substituted, &config.parse_limits())
        .map_err(|cause| EngineError::evaluation(expr, cause))
}

/// Evaluates a formula against the current variable values.
///
/// ```
/// use fiche_rs::resolver::evaluate_formula;
/// use fiche_rs::variable::{Variable, VariableSet};
///
/// let vars = VariableSet::from_vec(vec![
///     Variable::literal("L", 200.0),
///     Variable::literal("W", 100.0),
/// ]);
/// assert_eq!(evaluate_formula("L*W", &vars).unwrap(), 20000.0);
/// assert_eq!(evaluate_formula("if(L > W, sqrt(L*2), 0)", &vars).unwrap(), 20.0);
/// ```
pub fn evaluate_formula(expr: &str, variables: &VariableSet) -> EngineResult<Real> {
    evaluate_formula_with(expr, variables, &EngineConfig::default())
}

/// [`evaluate_formula`] with explicit configuration.
///
/// Fails with `MissingVariable` when a needed name is absent and with
/// `Evaluation` when the text is not valid arithmetic or the result is NaN
/// or infinite.
pub fn evaluate_formula_with(
    expr: &str,
    variables: &VariableSet,
    config: &EngineConfig,
) -> EngineResult<Real> {
    if let Some(conditional) = parse_conditional(expr) {
        let conditional = conditional?;
        let condition = evaluate_arithmetic(conditional.condition, variables, config)?;
        let branch = if truthy(condition) {
            conditional.then_branch
        } else {
            conditional.else_branch
        };
        return evaluate_formula_with(branch, variables, config);
    }

    let value = evaluate_arithmetic(expr, variables, config)?;
    if !value.is_finite() {
        return Err(EngineError::evaluation(expr, ExprError::NonFinite { value }));
    }
    Ok(value)
}
