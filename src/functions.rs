//! Built-in mathematical functions and operators for formula evaluation.
//!
//! Every builtin has the shape `fn(Real, Real) -> Real`; unary functions ignore
//! their second argument. Special inputs (negative square roots, division by
//! zero) return NaN or an infinity rather than panicking: the evaluator turns
//! non-finite results into an error for the one formula concerned.
//!
//! Implementations use `libm` so results do not depend on the platform's
//! libm; the `f32` feature switches to the single-precision variants.

#[cfg(feature = "f32")]
use libm::{
    ceilf as libm_ceil, expf as libm_exp, fabsf as libm_fabs, floorf as libm_floor,
    fmodf as libm_fmod, log10f as libm_log10, logf as libm_ln, powf as libm_pow,
    roundf as libm_round, sqrtf as libm_sqrt,
};

#[cfg(not(feature = "f32"))]
use libm::{
    ceil as libm_ceil, exp as libm_exp, fabs as libm_fabs, floor as libm_floor, fmod as libm_fmod,
    log as libm_ln, log10 as libm_log10, pow as libm_pow, round as libm_round, sqrt as libm_sqrt,
};

use crate::Real;

/// A builtin implementation.
pub type BuiltinFn = fn(Real, Real) -> Real;

/// Namespace prefix produced by the normalizer for canonical math calls.
pub const MATH_NAMESPACE: &str = "math";

/// Prefix found in formulas written for the legacy editor (`Math.sqrt(x)`).
pub const LEGACY_MATH_NAMESPACE: &str = "Math";

/// True for `math` and its legacy spelling `Math`.
pub fn is_math_namespace(name: &str) -> bool {
    name == MATH_NAMESPACE || name == LEGACY_MATH_NAMESPACE
}

/// Names callable as `name(...)` or `math.name(...)`.
pub const CALLABLE_NAMES: &[&str] = &[
    "sqrt", "pow", "abs", "min", "max", "floor", "ceil", "round", "exp", "ln", "log10",
];

/// Named constants readable as `pi` or `math.pi`.
pub const CONSTANT_NAMES: &[&str] = &["pi", "e"];

/// Looks up a callable builtin, returning its arity and implementation.
pub fn lookup_callable(name: &str) -> Option<(usize, BuiltinFn)> {
    let entry: (usize, BuiltinFn) = match name {
        "sqrt" => (1, sqrt),
        "pow" => (2, pow),
        "abs" => (1, abs),
        "min" => (2, min),
        "max" => (2, max),
        "floor" => (1, floor),
        "ceil" => (1, ceil),
        "round" => (1, round),
        "exp" => (1, exp),
        "ln" => (1, ln),
        "log10" => (1, log10),
        _ => return None,
    };
    Some(entry)
}

/// Looks up an operator node produced by the parser.
pub fn lookup_operator(name: &str) -> Option<(usize, BuiltinFn)> {
    let entry: (usize, BuiltinFn) = match name {
        "+" => (2, add),
        "-" => (2, sub),
        "*" => (2, mul),
        "/" => (2, div),
        "%" => (2, fmod),
        "^" | "**" => (2, pow),
        "<" => (2, lt),
        ">" => (2, gt),
        "<=" => (2, le),
        ">=" => (2, ge),
        "==" => (2, eq),
        "!=" => (2, ne),
        "neg" => (1, neg),
        "not" => (1, not),
        _ => return None,
    };
    Some(entry)
}

/// Looks up a named constant.
pub fn lookup_constant(name: &str) -> Option<Real> {
    match name {
        "pi" => Some(crate::constants::PI),
        "e" => Some(crate::constants::E),
        _ => None,
    }
}

/// Truthiness of a real: zero and NaN are false.
pub fn truthy(value: Real) -> bool {
    value != 0.0 && !value.is_nan()
}

fn bool_to_real(b: bool) -> Real {
    if b { 1.0 } else { 0.0 }
}

pub fn add(a: Real, b: Real) -> Real {
    a + b
}

pub fn sub(a: Real, b: Real) -> Real {
    a - b
}

pub fn mul(a: Real, b: Real) -> Real {
    a * b
}

/// Divides `a` by `b`. Division by zero follows IEEE 754 (±inf, or NaN for 0/0).
pub fn div(a: Real, b: Real) -> Real {
    a / b
}

pub fn fmod(a: Real, b: Real) -> Real {
    libm_fmod(a, b)
}

pub fn neg(a: Real, _: Real) -> Real {
    -a
}

pub fn not(a: Real, _: Real) -> Real {
    bool_to_real(!truthy(a))
}

pub fn lt(a: Real, b: Real) -> Real {
    bool_to_real(a < b)
}

pub fn gt(a: Real, b: Real) -> Real {
    bool_to_real(a > b)
}

pub fn le(a: Real, b: Real) -> Real {
    bool_to_real(a <= b)
}

pub fn ge(a: Real, b: Real) -> Real {
    bool_to_real(a >= b)
}

pub fn eq(a: Real, b: Real) -> Real {
    bool_to_real(a == b)
}

pub fn ne(a: Real, b: Real) -> Real {
    bool_to_real(a != b)
}

pub fn abs(a: Real, _: Real) -> Real {
    libm_fabs(a)
}

/// Returns the larger of two values.
pub fn max(a: Real, b: Real) -> Real {
    if a > b { a } else { b }
}

/// Returns the smaller of two values.
pub fn min(a: Real, b: Real) -> Real {
    if a < b { a } else { b }
}

pub fn floor(a: Real, _: Real) -> Real {
    libm_floor(a)
}

pub fn ceil(a: Real, _: Real) -> Real {
    libm_ceil(a)
}

pub fn round(a: Real, _: Real) -> Real {
    libm_round(a)
}

pub fn exp(a: Real, _: Real) -> Real {
    libm_exp(a)
}

pub fn ln(a: Real, _: Real) -> Real {
    libm_ln(a)
}

pub fn log10(a: Real, _: Real) -> Real {
    libm_log10(a)
}

/// Square root; negative inputs give NaN.
pub fn sqrt(a: Real, _: Real) -> Real {
    if a < 0.0 { Real::NAN } else { libm_sqrt(a) }
}

/// Raises `a` to the power `b`.
///
/// - 0^0 = 1 (by convention)
/// - Negative base with non-integer exponent returns NaN
pub fn pow(a: Real, b: Real) -> Real {
    if a == 0.0 && b == 0.0 {
        return 1.0;
    }
    if a < 0.0 && b != libm_floor(b) {
        return Real::NAN;
    }
    libm_pow(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;

    #[test]
    fn test_arithmetic() {
        assert_eq!(add(2.0, 3.0), 5.0);
        assert_eq!(sub(2.0, 3.0), -1.0);
        assert_eq!(mul(2.0, 3.0), 6.0);
        assert_eq!(div(3.0, 2.0), 1.5);
        assert!(div(1.0, 0.0).is_infinite());
        assert!(div(0.0, 0.0).is_nan());
        assert_eq!(fmod(7.0, 3.0), 1.0);
        assert_eq!(neg(4.0, 0.0), -4.0);
    }

    #[test]
    fn test_comparisons_and_truthiness() {
        assert_eq!(lt(1.0, 2.0), 1.0);
        assert_eq!(gt(1.0, 2.0), 0.0);
        assert_eq!(le(2.0, 2.0), 1.0);
        assert_eq!(ge(1.0, 2.0), 0.0);
        assert_eq!(eq(2.0, 2.0), 1.0);
        assert_eq!(ne(2.0, 2.0), 0.0);
        assert!(!truthy(0.0));
        assert!(!truthy(Real::NAN));
        assert!(truthy(-0.5));
        assert_eq!(not(0.0, 0.0), 1.0);
    }

    #[test]
    fn test_sqrt_and_pow() {
        assert_eq!(sqrt(16.0, 0.0), 4.0);
        assert!(sqrt(-1.0, 0.0).is_nan());
        assert_eq!(pow(2.0, 10.0), 1024.0);
        assert_eq!(pow(0.0, 0.0), 1.0);
        assert_eq!(pow(-2.0, 3.0), -8.0);
        assert!(pow(-2.0, 0.5).is_nan());
        assert_approx_eq!(pow(9.0, 0.5), 3.0);
    }

    #[test]
    fn test_rounding_and_logs() {
        assert_eq!(floor(1.7, 0.0), 1.0);
        assert_eq!(ceil(1.2, 0.0), 2.0);
        assert_eq!(round(2.5, 0.0), 3.0);
        assert_eq!(abs(-3.0, 0.0), 3.0);
        assert_approx_eq!(ln(crate::constants::E, 0.0), 1.0);
        assert_approx_eq!(log10(1000.0, 0.0), 3.0);
        assert_approx_eq!(exp(0.0, 0.0), 1.0);
    }

    #[test]
    fn test_math_namespace_spellings() {
        assert!(is_math_namespace("math"));
        assert!(is_math_namespace("Math"));
        assert!(!is_math_namespace("MATH"));
    }

    #[test]
    fn test_lookup_tables() {
        assert_eq!(lookup_callable("pow").map(|(arity, _)| arity), Some(2));
        assert_eq!(lookup_callable("sqrt").map(|(arity, _)| arity), Some(1));
        assert!(lookup_callable("sin").is_none());
        assert!(lookup_operator("**").is_some());
        assert!(lookup_operator("sqrt").is_none());
        for name in CALLABLE_NAMES {
            assert!(lookup_callable(name).is_some(), "{name} missing from lookup");
        }
        assert_eq!(lookup_constant("e"), Some(crate::constants::E));
    }
}
