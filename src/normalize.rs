//! Canonicalization of user-authored formulas.
//!
//! `sqrt(x)` and `pow(x, y)` are rewritten to the namespaced calls the
//! evaluator treats as canonical (`math.sqrt(x)`, `math.pow(x,y)`). Nothing
//! else changes: unknown function names and unbalanced parentheses pass
//! through untouched and fail later, at evaluation.
//!
//! The argument patterns are deliberately shallow. `sqrt`'s argument runs to
//! the first `)`, and `pow`'s first argument runs to the first `,`. A call
//! that is already qualified is matched together with its prefix and
//! re-emitted with the canonical prefix, which keeps the rewrite idempotent.
//! The legacy `Math.` prefix counts as a qualifier and is canonicalized.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::functions::MATH_NAMESPACE;

static SQRT_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:math|Math)\.)?sqrt\(([^)]+)\)").expect("valid sqrt pattern")
});

static POW_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:math|Math)\.)?pow\(([^,]+),([^)]+)\)").expect("valid pow pattern")
});

/// Rewrites `sqrt(...)` and `pow(...,...)` into canonical `math.` calls.
///
/// ```
/// use fiche_rs::normalize::normalize;
///
/// assert_eq!(normalize("sqrt(a) + pow(b,2)"), "math.sqrt(a) + math.pow(b,2)");
/// assert_eq!(normalize("math.sqrt(a)"), "math.sqrt(a)");
/// ```
pub fn normalize(expr: &str) -> String {
    let sqrt_done = SQRT_CALL.replace_all(expr, |caps: &Captures<'_>| {
        format!("{MATH_NAMESPACE}.sqrt({})", &caps[2])
    });
    POW_CALL
        .replace_all(&sqrt_done, |caps: &Captures<'_>| {
            format!("{MATH_NAMESPACE}.pow({},{})", &caps[2], &caps[3])
        })
        .into_owned()
}
