//! Recomputation of computed variables.
//!
//! [`resolve_all`] runs when a test is loaded; [`on_variable_edited`] runs
//! when a user commits a new value for an independent variable, and
//! [`propagate_from`] when a variable changed for any other reason (live
//! push). All three work in place on a [`VariableSet`] and never abort: a
//! formula that fails keeps its previous value and the failure is returned in
//! the [`RecomputeReport`].
//!
//! With [`Propagation::OneHop`] the legacy behaviour is kept exactly:
//! `resolve_all` is one pass in set order and an edit only reaches variables
//! whose formula names the edited variable. [`Propagation::Transitive`]
//! orders by dependency, follows the whole dependent closure and reports
//! cycles.

use tracing::{debug, warn};

use crate::Real;
use crate::config::{EngineConfig, Propagation};
use crate::error::{EngineError, EngineResult};
use crate::graph::DependencyGraph;
use crate::resolver::{evaluate_formula_with, references};
use crate::variable::{VariableSet, format_value};

/// One variable whose formula could not be recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecomputeFailure {
    pub name: String,
    pub error: EngineError,
}

/// What a recompute pass changed and what it had to skip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecomputeReport {
    /// Names whose value or expression changed, in the order they changed.
    pub changed: Vec<String>,
    pub failures: Vec<RecomputeFailure>,
}

impl RecomputeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_for(&self, name: &str) -> Option<&EngineError> {
        self.failures
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.error)
    }

    pub fn merge(&mut self, other: RecomputeReport) {
        for name in other.changed {
            self.mark_changed(&name);
        }
        self.failures.extend(other.failures);
    }

    fn mark_changed(&mut self, name: &str) {
        if !self.changed.iter().any(|n| n == name) {
            self.changed.push(name.to_string());
        }
    }

    fn fail(&mut self, name: &str, error: EngineError) {
        warn!(variable = name, error = %error, "recompute skipped");
        self.failures.push(RecomputeFailure {
            name: name.to_string(),
            error,
        });
    }
}

/// Reads a user-typed value for an independent variable.
///
/// Surrounding whitespace is ignored; anything that is not a finite number
/// is rejected.
pub fn parse_literal(input: &str) -> EngineResult<Real> {
    input
        .trim()
        .parse::<Real>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EngineError::InvalidLiteral {
            input: input.to_string(),
        })
}

/// Variables that take part in recomputation.
fn is_formula(expression: &str) -> bool {
    !expression.trim().is_empty() && !crate::variable::is_literal(expression)
}

/// Re-evaluates the variable at `index` against the current set.
fn recompute_at(
    variables: &mut VariableSet,
    index: usize,
    config: &EngineConfig,
    report: &mut RecomputeReport,
) {
    let Some(variable) = variables.at(index) else {
        return;
    };
    if !is_formula(&variable.expression) {
        return;
    }
    let name = variable.name.clone();
    let expression = variable.expression.clone();

    match evaluate_formula_with(&expression, variables, config) {
        Ok(value) => {
            if let Some(variable) = variables.at_mut(index) {
                if variable.computed_value != value {
                    debug!(variable = %name, old = variable.computed_value, new = value, "recomputed");
                    variable.computed_value = value;
                    report.mark_changed(&name);
                }
            }
        }
        Err(error) => report.fail(&name, error),
    }
}

/// Recomputes every formula variable of a freshly loaded set.
///
/// One-hop mode visits variables in set order, each seeing the values
/// already updated earlier in the pass; a chain declared out of order is
/// only settled by a second call. Transitive mode visits in dependency order
/// and reports each variable caught in a cycle.
pub fn resolve_all(variables: &mut VariableSet, config: &EngineConfig) -> RecomputeReport {
    let mut report = RecomputeReport::default();
    debug!(count = variables.len(), mode = ?config.propagation, "resolving all variables");

    match config.propagation {
        Propagation::OneHop => {
            for index in 0..variables.len() {
                recompute_at(variables, index, config, &mut report);
            }
        }
        Propagation::Transitive => {
            let graph = DependencyGraph::build(variables);
            let order = graph.calc_order();
            for &index in &order.order {
                recompute_at(variables, index, config, &mut report);
            }
            report_cycles(variables, &graph, &order.blocked, &mut report);
        }
    }
    report
}

fn report_cycles(
    variables: &VariableSet,
    graph: &DependencyGraph,
    blocked: &[usize],
    report: &mut RecomputeReport,
) {
    if blocked.is_empty() {
        return;
    }
    let names: Vec<String> = graph
        .cycle_members(blocked)
        .into_iter()
        .filter_map(|i| variables.at(i).map(|v| v.name.clone()))
        .collect();
    for &index in blocked {
        if let Some(variable) = variables.at(index) {
            report.fail(
                &variable.name,
                EngineError::Cycle {
                    names: names.clone(),
                },
            );
        }
    }
}

/// Commits `value` as the new literal of the independent variable `name` and
/// recomputes its dependents.
///
/// Nothing changes when the value is not finite (`InvalidLiteral`), the name
/// is unknown (`UnknownTarget`) or the variable is computed from a formula
/// (`DependentTarget`).
pub fn on_variable_edited(
    variables: &mut VariableSet,
    name: &str,
    value: Real,
    config: &EngineConfig,
) -> EngineResult<RecomputeReport> {
    if !value.is_finite() {
        return Err(EngineError::InvalidLiteral {
            input: format_value(value),
        });
    }
    let target = variables
        .get_mut(name)
        .ok_or_else(|| EngineError::UnknownTarget {
            name: name.to_string(),
        })?;
    if !target.is_independent() {
        return Err(EngineError::DependentTarget {
            name: name.to_string(),
        });
    }

    let mut report = RecomputeReport::default();
    let expression = format_value(value);
    if target.computed_value != value || target.expression != expression {
        target.computed_value = value;
        target.expression = expression;
        report.mark_changed(name);
    }
    debug!(variable = name, value, "independent variable edited");

    report.merge(propagate_from(variables, name, config));
    Ok(report)
}

/// Recomputes the variables affected by a change of `name`.
///
/// In one-hop mode these are the other formula variables that reference
/// `name` directly, taken in set order; a dependent visited later sees the
/// new value of one visited earlier. In transitive mode the whole dependent
/// closure is recomputed in dependency order.
pub fn propagate_from(
    variables: &mut VariableSet,
    name: &str,
    config: &EngineConfig,
) -> RecomputeReport {
    let mut report = RecomputeReport::default();
    let Some(origin) = variables.position(name) else {
        return report;
    };

    match config.propagation {
        Propagation::OneHop => {
            let direct: Vec<usize> = variables
                .iter()
                .enumerate()
                .filter(|(index, v)| *index != origin && references(&v.expression, name))
                .map(|(index, _)| index)
                .collect();
            for index in direct {
                recompute_at(variables, index, config, &mut report);
            }
        }
        Propagation::Transitive => {
            let graph = DependencyGraph::build(variables);
            let closure = graph.dependents_closure(origin);
            let order = graph.calc_order();
            for &index in order.order.iter().filter(|i| closure.contains(i)) {
                recompute_at(variables, index, config, &mut report);
            }
            let blocked: Vec<usize> = order
                .blocked
                .iter()
                .copied()
                .filter(|i| closure.contains(i))
                .collect();
            report_cycles(variables, &graph, &blocked, &mut report);
        }
    }
    report
}
