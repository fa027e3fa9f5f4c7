#![doc = r##"
# fiche-rs

Variable expression engine for laboratory test sheets.

A test defines named variables. Each one holds either a bare numeral (an
*independent* variable, typed in by the operator) or a formula over other
variables, numbers, `sqrt`/`pow` and the other math builtins, and the
`if(cond, then, else)` form. Tables embedded in the test show variable values
in cells tagged with `data-variable="name"` and feed user edits back.

## Pipeline

1. [`normalize`](normalize::normalize) canonicalizes `sqrt(x)` / `pow(x,y)`
   to `math.sqrt(x)` / `math.pow(x,y)`.
2. [`substitute`](resolver::substitute) replaces every variable name with its
   current value, or reports the first missing name.
3. [`interp`](engine::interp) parses and evaluates the closed arithmetic in a
   sandboxed Pratt parser; the result must be finite.
4. The [`scheduler`] applies this to a whole [`VariableSet`]: once on load
   ([`resolve_all`](scheduler::resolve_all)) and after each edit
   ([`on_variable_edited`](scheduler::on_variable_edited)).
5. The [`table`] module renders tables and commits cell edits.

## Quick Start

```rust
use fiche_rs::config::EngineConfig;
use fiche_rs::scheduler::{on_variable_edited, resolve_all};
use fiche_rs::variable::{Variable, VariableSet};

let mut vars = VariableSet::from_vec(vec![
    Variable::new("L", "200", 200.0),
    Variable::new("W", "100", 100.0),
    Variable::new("Area", "L*W", 0.0),
]);
let config = EngineConfig::default();

resolve_all(&mut vars, &config);
assert_eq!(vars.value("Area"), Some(20000.0));

let report = on_variable_edited(&mut vars, "L", 50.0, &config).unwrap();
assert_eq!(vars.value("Area"), Some(5000.0));
assert_eq!(report.changed, vec!["L", "Area"]);
```

## Tables

```rust
use fiche_rs::table::{Mode, render};
use fiche_rs::variable::{Variable, VariableSet};

let vars = VariableSet::from_vec(vec![
    Variable::literal("t", 15.0).with_bounds(Some(0.0), Some(10.0)),
]);
let table = render(
    r#"<table><tr><td>T</td><td data-variable="t">0</td></tr></table>"#,
    &vars,
    Mode::Display,
)
.unwrap();
let cell = table.cell(1).unwrap();
assert_eq!(cell.text, "15");
assert!(cell.is_editable());
assert!(cell.is_out_of_range());
```

## Propagation

By default an edit reaches only the variables whose formula names the edited
variable, and `resolve_all` is a single pass in set order. Setting
[`Propagation::Transitive`](config::Propagation::Transitive) recomputes the
whole dependent closure in dependency order and reports cycles.

## Feature Flags

- `f32`: use 32-bit floating point for values (64-bit by default)
"##]

pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod functions;
pub mod graph;
pub mod lexer;
pub mod normalize;
pub mod record;
pub mod resolver;
pub mod scheduler;
pub mod session;
pub mod table;
pub mod types;
pub mod variable;

pub use config::{EngineConfig, Propagation};
pub use error::{EngineError, EngineResult, ExprError, StoreError};
pub use normalize::normalize;
pub use record::{Element, TestRecord};
pub use resolver::{evaluate_formula, substitute};
pub use scheduler::{RecomputeReport, on_variable_edited, resolve_all};
pub use session::{MemoryStore, Session, VariableStore};
pub use table::{CommitOutcome, Mode, RenderedTable, commit_cell, render};
pub use variable::{Variable, VariableSet};

/// Floating-point type of every value.
#[cfg(feature = "f32")]
pub type Real = f32;

#[cfg(not(feature = "f32"))]
pub type Real = f64;

pub mod constants {
    use super::Real;

    #[cfg(feature = "f32")]
    pub const PI: Real = core::f32::consts::PI;
    #[cfg(feature = "f32")]
    pub const E: Real = core::f32::consts::E;
    #[cfg(feature = "f32")]
    pub const TEST_PRECISION: Real = 1e-6;

    #[cfg(not(feature = "f32"))]
    pub const PI: Real = core::f64::consts::PI;
    #[cfg(not(feature = "f32"))]
    pub const E: Real = core::f64::consts::E;
    #[cfg(not(feature = "f32"))]
    pub const TEST_PRECISION: Real = 1e-10;
}

/// Checks that two floating point values are equal within an epsilon.
/// NaN equals NaN and same-signed infinities are equal.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($left, $right, $crate::constants::TEST_PRECISION)
    };
    ($left:expr, $right:expr, $epsilon:expr $(,)?) => {{
        let left_val: $crate::Real = $left;
        let right_val: $crate::Real = $right;
        let eps: $crate::Real = $epsilon;

        if left_val.is_nan() && right_val.is_nan() {
        } else if left_val.is_infinite()
            && right_val.is_infinite()
            && left_val.signum() == right_val.signum()
        {
        } else {
            assert!(
                (left_val - right_val).abs() < eps,
                "assertion failed: `(left ≈ right)` (left: `{}`, right: `{}`, epsilon: `{}`)",
                left_val,
                right_val,
                eps
            );
        }
    }};
    ($left:expr, $right:expr, $epsilon:expr, $($arg:tt)+) => {{
        let left_val: $crate::Real = $left;
        let right_val: $crate::Real = $right;
        let eps: $crate::Real = $epsilon;

        if left_val.is_nan() && right_val.is_nan() {
        } else if left_val.is_infinite()
            && right_val.is_infinite()
            && left_val.signum() == right_val.signum()
        {
        } else {
            assert!((left_val - right_val).abs() < eps, $($arg)+);
        }
    }};
}
