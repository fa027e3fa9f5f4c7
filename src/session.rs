//! An editing session over one test.
//!
//! The session owns the test's variables and elements, the engine
//! configuration and the identity of the user at the keyboard. Every
//! operation updates the in-memory state first and then hands each changed
//! variable to the [`VariableStore`]. Writes are fire-and-forget: a failed
//! write is logged and the in-memory update stands.

use tracing::{debug, error};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, StoreError};
use crate::record::{Element, TestRecord};
use crate::scheduler::{self, RecomputeReport, parse_literal};
use crate::table::{self, CommitOutcome, Mode, RenderedTable, TableFragment};
use crate::variable::{BoundsUpdate, Variable, VariableSet};

/// Persistence for single variables (`PUT variable`).
pub trait VariableStore {
    fn put_variable(&mut self, test_id: Option<i64>, variable: &Variable) -> Result<(), StoreError>;
}

/// Keeps every write in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    writes: Vec<(Option<i64>, Variable)>,
    reject: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes of `name`.
    pub fn rejecting(name: impl Into<String>) -> Self {
        Self {
            writes: Vec::new(),
            reject: vec![name.into()],
        }
    }

    /// Accepted writes, oldest first.
    pub fn writes(&self) -> impl DoubleEndedIterator<Item = &Variable> {
        self.writes.iter().map(|(_, v)| v)
    }

    pub fn written_names(&self) -> Vec<&str> {
        self.writes().map(|v| v.name.as_str()).collect()
    }

    /// Most recent accepted write of `name`.
    pub fn latest(&self, name: &str) -> Option<&Variable> {
        self.writes().rev().find(|v| v.name == name)
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }
}

impl VariableStore for MemoryStore {
    fn put_variable(&mut self, test_id: Option<i64>, variable: &Variable) -> Result<(), StoreError> {
        if self.reject.contains(&variable.name) {
            return Err(StoreError {
                name: variable.name.clone(),
                message: "rejected".to_string(),
            });
        }
        self.writes.push((test_id, variable.clone()));
        Ok(())
    }
}

pub struct Session<S: VariableStore> {
    test_id: Option<i64>,
    test_name: String,
    variables: VariableSet,
    elements: Vec<Element>,
    config: EngineConfig,
    store: S,
    user: Option<String>,
    load_report: RecomputeReport,
}

impl<S: VariableStore> Session<S> {
    /// Takes over a loaded test and brings its computed values up to date.
    ///
    /// Values recomputed here are not written back.
    pub fn open(record: TestRecord, config: EngineConfig, store: S) -> Self {
        let TestRecord {
            id,
            test_name,
            elements,
            mut variables,
            ..
        } = record;
        let load_report = scheduler::resolve_all(&mut variables, &config);
        debug!(
            test = ?id,
            variables = variables.len(),
            elements = elements.len(),
            failures = load_report.failures.len(),
            "session opened"
        );
        Self {
            test_id: id,
            test_name,
            variables,
            elements,
            config,
            store,
            user: None,
            load_report,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn test_id(&self) -> Option<i64> {
        self.test_id
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Failures met by the recompute run at [`Session::open`].
    pub fn load_report(&self) -> &RecomputeReport {
        &self.load_report
    }

    /// Runs the full recompute again. Changed values are written back.
    pub fn resolve_all(&mut self) -> RecomputeReport {
        let report = scheduler::resolve_all(&mut self.variables, &self.config);
        self.persist(report.changed.iter().map(String::as_str));
        report
    }

    /// Commits a typed value for the independent variable `name`.
    pub fn edit_value(&mut self, name: &str, input: &str) -> EngineResult<RecomputeReport> {
        let value = parse_literal(input)?;
        let report = scheduler::on_variable_edited(&mut self.variables, name, value, &self.config)?;
        debug!(user = ?self.user, variable = name, value, "value edited");
        self.persist(report.changed.iter().map(String::as_str));
        Ok(report)
    }

    /// Changes the display bounds and unit of `name`.
    pub fn set_bounds(&mut self, name: &str, update: BoundsUpdate) -> EngineResult<()> {
        self.variables.set_bounds(name, update)?;
        self.persist([name]);
        Ok(())
    }

    /// Merges a variable pushed by another session and recomputes the
    /// variables that depend on it.
    ///
    /// The pushed record replaces the local one (its id is kept when the push
    /// has none). Only recomputed dependents are written back.
    pub fn apply_remote(&mut self, mut variable: Variable) -> RecomputeReport {
        if variable.id.is_none() {
            variable.id = self.variables.get(&variable.name).and_then(|v| v.id);
        }
        let name = variable.name.clone();
        debug!(variable = %name, value = variable.computed_value, "remote update");
        self.variables.replace(variable);

        let report = scheduler::propagate_from(&mut self.variables, &name, &self.config);
        self.persist(report.changed.iter().map(String::as_str));
        report
    }

    fn table_content(&self, element: usize) -> EngineResult<&str> {
        self.elements
            .get(element)
            .and_then(Element::as_table)
            .map(|t| t.table_content.as_str())
            .ok_or_else(|| EngineError::Fragment(format!("element {element} is not a table")))
    }

    /// Renders table element `element` with the current values.
    pub fn render_table(&self, element: usize, mode: Mode) -> EngineResult<RenderedTable> {
        table::render(self.table_content(element)?, &self.variables, mode)
    }

    /// Commits text typed into a cell of table element `element`.
    ///
    /// The element's stored HTML is updated to reflect the commit.
    pub fn commit_cell(
        &mut self,
        element: usize,
        cell: usize,
        text: &str,
        mode: Mode,
    ) -> EngineResult<CommitOutcome> {
        let mut fragment = TableFragment::parse(self.table_content(element)?)?;
        let outcome = table::commit_cell(
            &mut fragment,
            cell,
            text,
            &mut self.variables,
            mode,
            &self.config,
        )?;
        if let Some(table) = self.elements.get_mut(element).and_then(Element::as_table_mut) {
            table.table_content = fragment.to_html();
        }
        let changed: Vec<String> = outcome.changed_names().into_iter().map(str::to_string).collect();
        self.persist(changed.iter().map(String::as_str));
        Ok(outcome)
    }

    fn persist<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            let Some(variable) = self.variables.get(name) else {
                continue;
            };
            if let Err(err) = self.store.put_variable(self.test_id, variable) {
                error!(variable = name, error = %err, "variable write failed");
            }
        }
    }
}
