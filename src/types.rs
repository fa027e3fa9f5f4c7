//! Type definitions for the arithmetic parser and evaluator.
//!
//! The AST is allocated in a [`bumpalo::Bump`] arena owned by the caller: a
//! formula is parsed, evaluated once and the arena dropped. Names and child
//! slices borrow from the arena, so nodes are `Copy`-cheap to walk.

use crate::Real;

/// Abstract Syntax Tree node for a substituted formula.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AstExpr<'arena> {
    /// A literal numerical value.
    ///
    /// Examples: `3.14`, `42`, `.5`
    Constant(Real),

    /// An identifier left in the text. After substitution only reserved
    /// constants (`pi`, `e`) are expected here; anything else fails.
    Variable(&'arena str),

    /// A function or operator application.
    ///
    /// Binary operators are stored as functions named after the operator
    /// (`"+"`, `"<="`, ...); unary minus is `neg` and logical not is `not`.
    /// `namespace` holds the prefix of a qualified call such as `math.sqrt(x)`.
    Function {
        /// Function or operator name
        name: &'arena str,
        /// Qualifier before the dot, if any
        namespace: Option<&'arena str>,
        /// Argument expressions
        args: &'arena [AstExpr<'arena>],
    },

    /// A dotted name that is not called, e.g. `math.pi`.
    Attribute {
        /// The base object name
        base: &'arena str,
        /// The attribute name
        attr: &'arena str,
    },

    /// A logical operation with short-circuit evaluation.
    ///
    /// Boolean values are reals: `0.0` and NaN are false, everything else is
    /// true. Comparisons produce `1.0` or `0.0`.
    LogicalOp {
        /// The logical operator (AND or OR)
        op: LogicalOperator,
        /// The left operand (always evaluated)
        left: &'arena AstExpr<'arena>,
        /// The right operand (evaluated only when the left does not decide)
        right: &'arena AstExpr<'arena>,
    },
}

/// Token categories produced by the lexer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// A numeric literal (integer, decimal, leading dot, scientific).
    Number,
    /// An identifier.
    Variable,
    /// An operator such as `+`, `<=`, `&&` or the `.` qualifier.
    Operator,
    /// `(`
    Open,
    /// `)`
    Close,
    /// `,`
    Separator,
    /// A character or malformed number the grammar does not accept.
    Error,
}

/// Short-circuit logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOperator {
    /// `&&`
    And,
    /// `||`
    Or,
}

impl core::fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "&&"),
            LogicalOperator::Or => write!(f, "||"),
        }
    }
}
