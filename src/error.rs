//! Error types for formula evaluation and variable recomputation.
//!
//! Two layers exist. [`ExprError`] describes why a closed arithmetic string
//! (variables already substituted) could not be parsed or evaluated.
//! [`EngineError`] is the taxonomy the variable engine reports to its callers:
//! every failure is scoped to one variable or one cell commit and never aborts
//! a whole recompute pass.

use thiserror::Error;

use crate::Real;

/// Result type for the arithmetic layer.
pub type Result<T> = core::result::Result<T, ExprError>;

/// Result type for engine operations.
pub type EngineResult<T> = core::result::Result<T, EngineError>;

/// Error type for expression parsing and evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// The tokenizer met a character or number it cannot read.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Unexpected token, missing operand, trailing input and friends.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// A parenthesis without its partner.
    #[error("Unmatched parenthesis at position {position}: found '{found}'")]
    UnmatchedParenthesis { position: usize, found: String },

    /// An identifier survived substitution and reached the evaluator.
    #[error("Unknown variable: '{name}'")]
    UnknownVariable { name: String },

    /// A call to a function the evaluator does not provide.
    #[error("Unknown function: '{name}'")]
    UnknownFunction { name: String },

    /// A builtin called with the wrong number of arguments.
    #[error("Invalid function call to '{name}': expected {expected} arguments, found {found}")]
    InvalidFunctionCall {
        /// Name of the function that was called
        name: String,
        /// Expected number of arguments
        expected: usize,
        /// Actual number of arguments provided
        found: usize,
    },

    /// The expression evaluated to NaN or an infinity.
    #[error("Expression produced a non-finite value: {value}")]
    NonFinite { value: Real },

    /// Nesting exceeded the configured depth.
    #[error("Recursion limit exceeded: {0}")]
    RecursionLimit(String),

    /// Input longer than the configured maximum.
    #[error("Expression too long: {len} characters (maximum is {max})")]
    TooLong { len: usize, max: usize },
}

/// Failures reported by the variable engine.
///
/// `MissingVariable` and `Evaluation` are per-variable: a recompute pass
/// collects them and carries on. `InvalidLiteral` is swallowed by cell commits
/// (the cell reverts silently).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A formula references a name absent from the variable set.
    #[error("Missing variable: '{name}'")]
    MissingVariable { name: String },

    /// The substituted formula is not valid arithmetic or is not finite.
    #[error("Cannot evaluate '{expression}': {cause}")]
    Evaluation {
        expression: String,
        #[source]
        cause: ExprError,
    },

    /// A user-entered value for an independent variable is not a finite number.
    #[error("Invalid literal value: '{input}'")]
    InvalidLiteral { input: String },

    /// Variables whose formulas reference each other in a loop.
    #[error("Dependency cycle between: {}", names.join(", "))]
    Cycle { names: Vec<String> },

    /// The edited variable does not exist.
    #[error("No variable named '{name}'")]
    UnknownTarget { name: String },

    /// Only independent variables accept direct values.
    #[error("Variable '{name}' is computed from a formula and cannot be edited directly")]
    DependentTarget { name: String },

    /// A bounds update would leave `min > max`.
    #[error("Min > Max! ({min} > {max})")]
    InvalidBounds { min: Real, max: Real },

    /// The table fragment could not be read.
    #[error("Malformed table fragment: {0}")]
    Fragment(String),
}

/// A variable write rejected by the external store.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Store write failed for '{name}': {message}")]
pub struct StoreError {
    pub name: String,
    pub message: String,
}

impl EngineError {
    /// Wraps an arithmetic failure together with the text that was evaluated.
    pub fn evaluation(expression: impl Into<String>, cause: ExprError) -> Self {
        EngineError::Evaluation {
            expression: expression.into(),
            cause,
        }
    }
}

impl From<quick_xml::Error> for EngineError {
    fn from(err: quick_xml::Error) -> Self {
        EngineError::Fragment(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = EngineError::MissingVariable {
            name: "y".to_string(),
        };
        assert_eq!(err.to_string(), "Missing variable: 'y'");

        let err = EngineError::evaluation("1/0", ExprError::NonFinite { value: Real::INFINITY });
        assert_eq!(
            err.to_string(),
            "Cannot evaluate '1/0': Expression produced a non-finite value: inf"
        );

        let err = EngineError::Cycle {
            names: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "Dependency cycle between: a, b");
    }
}
