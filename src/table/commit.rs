//! Applying a finished cell edit to the variable set.

use tracing::{debug, info};

use crate::Real;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, ExprError};
use crate::resolver::{evaluate_formula_with, is_reserved};
use crate::scheduler::{RecomputeReport, on_variable_edited, parse_literal, propagate_from};
use crate::table::fragment::TableFragment;
use crate::table::{Mode, reference_name};
use crate::variable::{Variable, VariableSet, format_value, is_identifier};

/// What a committed cell edit did.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// `name = expr`: the variable was created or redefined and the cell
    /// now shows its value.
    Defined {
        name: String,
        created: bool,
        value: Real,
        report: RecomputeReport,
    },
    /// `name =`: the cell is bound to `name`, created as `0` when unknown.
    Declared { name: String, created: bool },
    /// `{{name}}`: the cell is bound to an existing variable.
    Bound { name: String },
    /// A new value for a bound independent variable.
    ValueEdited { name: String, report: RecomputeReport },
    /// The edit was discarded and the cell shows the variable's value again.
    Reverted { name: String },
    /// No effect on any variable.
    Ignored,
}

impl CommitOutcome {
    /// Variables the caller should write back to the store.
    pub fn changed_names(&self) -> Vec<&str> {
        match self {
            CommitOutcome::Defined { name, report, .. } => {
                let mut names = vec![name.as_str()];
                names.extend(
                    report
                        .changed
                        .iter()
                        .map(String::as_str)
                        .filter(|n| *n != name.as_str()),
                );
                names
            }
            CommitOutcome::Declared { name, created: true } => vec![name.as_str()],
            CommitOutcome::ValueEdited { report, .. } => {
                report.changed.iter().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Splits `name = expr`; the right-hand side may be empty.
fn split_assignment(text: &str) -> Option<(&str, &str)> {
    let (lhs, rhs) = text.split_once('=')?;
    let name = lhs.trim();
    is_identifier(name).then(|| (name, rhs.trim()))
}

/// Commits `new_text` typed into cell `index` of `fragment`.
///
/// Rules, first match wins: in author mode an assignment (`name = expr` or
/// `name =`) and then a reference (`{{name}}`); in both modes a plain edit of
/// a bound cell. Anything else leaves the typed text in the cell and touches
/// no variable.
///
/// Only a failing assignment is an error (including one that names a
/// builtin such as `max`); the cell is then left as it was.
/// A plain edit that is not a finite number, or that targets a computed
/// variable, reverts the cell silently.
pub fn commit_cell(
    fragment: &mut TableFragment,
    index: usize,
    new_text: &str,
    variables: &mut VariableSet,
    mode: Mode,
    config: &EngineConfig,
) -> EngineResult<CommitOutcome> {
    let cell = fragment
        .cell_mut(index)
        .ok_or_else(|| EngineError::Fragment(format!("no cell at index {index}")))?;
    if cell.has_image() {
        return Ok(CommitOutcome::Ignored);
    }
    let text = new_text.trim();

    if mode == Mode::Author {
        if let Some((name, expr)) = split_assignment(text) {
            if is_reserved(name) {
                return Err(EngineError::evaluation(
                    text,
                    ExprError::Syntax(format!("'{name}' is a reserved name")),
                ));
            }
            if expr.is_empty() {
                let created = !variables.contains(name);
                if created {
                    variables.upsert(Variable::literal(name, 0.0));
                }
                let shown = variables
                    .get(name)
                    .map_or_else(|| format_value(0.0), Variable::display_value);
                cell.set_text(&shown);
                cell.bind(name);
                debug!(variable = name, created, "cell declared");
                return Ok(CommitOutcome::Declared {
                    name: name.to_string(),
                    created,
                });
            }

            let value = evaluate_formula_with(expr, variables, config)?;
            let created = variables.upsert(Variable::new(name, expr, value));
            let report = propagate_from(variables, name, config);
            cell.set_text(&format_value(value));
            cell.bind(name);
            info!(variable = name, expression = expr, value, created, "variable defined from cell");
            return Ok(CommitOutcome::Defined {
                name: name.to_string(),
                created,
                value,
                report,
            });
        }

        if let Some(name) = reference_name(text) {
            return Ok(match variables.get(name) {
                Some(variable) => {
                    cell.set_text(&variable.display_value());
                    cell.bind(name);
                    CommitOutcome::Bound {
                        name: name.to_string(),
                    }
                }
                None => {
                    cell.set_text(new_text);
                    CommitOutcome::Ignored
                }
            });
        }
    }

    let bound = cell
        .bound_variable()
        .filter(|name| variables.contains(name))
        .map(str::to_string);
    let Some(name) = bound else {
        if mode == Mode::Author {
            cell.set_text(new_text);
        }
        return Ok(CommitOutcome::Ignored);
    };

    let outcome = match parse_literal(text) {
        Ok(value) => match on_variable_edited(variables, &name, value, config) {
            Ok(report) => CommitOutcome::ValueEdited {
                name: name.clone(),
                report,
            },
            Err(EngineError::DependentTarget { .. } | EngineError::InvalidLiteral { .. }) => {
                CommitOutcome::Reverted { name: name.clone() }
            }
            Err(other) => return Err(other),
        },
        Err(_) => CommitOutcome::Reverted { name: name.clone() },
    };
    if let CommitOutcome::Reverted { .. } = outcome {
        debug!(variable = %name, input = text, "cell edit reverted");
    }

    // The cell always ends up showing the variable's current value.
    if let Some(variable) = variables.get(&name) {
        cell.set_text(&variable.display_value());
    }
    Ok(outcome)
}
