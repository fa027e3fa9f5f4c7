//! Rendering a stored table against the current variable values.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::Real;
use crate::error::EngineResult;
use crate::table::fragment::{Cell, TableFragment};
use crate::table::{Mode, reference_name};
use crate::variable::{Variable, VariableSet};

/// Attribute marking a cell whose value lies outside its variable's bounds.
pub const OUT_OF_RANGE_ATTR: &str = "data-out-of-range";

const EDITABLE_ATTR: &str = "contenteditable";

bitflags! {
    /// State of one rendered cell.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CellFlags: u8 {
        /// The user may type into the cell.
        const EDITABLE     = 0b0001;
        /// The cell shows a known variable's value.
        const BOUND        = 0b0010;
        const OUT_OF_RANGE = 0b0100;
        /// The cell holds an image and is never edited.
        const IMAGE        = 0b1000;
    }
}

/// Inspection data shown when hovering a bound cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoverInfo {
    pub name: String,
    pub min: Option<Real>,
    pub max: Option<Real>,
    pub unit: Option<String>,
    pub expression: String,
    pub computed_value: Real,
}

impl From<&Variable> for HoverInfo {
    fn from(variable: &Variable) -> Self {
        Self {
            name: variable.name.clone(),
            min: variable.min,
            max: variable.max,
            unit: variable.unit.clone(),
            expression: variable.expression.clone(),
            computed_value: variable.computed_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCell {
    /// Position among the fragment's cells, in document order.
    pub index: usize,
    pub variable: Option<String>,
    pub text: String,
    pub flags: CellFlags,
    pub hover: Option<HoverInfo>,
}

impl RenderedCell {
    pub fn is_editable(&self) -> bool {
        self.flags.contains(CellFlags::EDITABLE)
    }

    pub fn is_out_of_range(&self) -> bool {
        self.flags.contains(CellFlags::OUT_OF_RANGE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTable {
    /// Regenerated HTML with values, `contenteditable` and range marks applied.
    pub html: String,
    pub cells: Vec<RenderedCell>,
}

impl RenderedTable {
    pub fn cell(&self, index: usize) -> Option<&RenderedCell> {
        self.cells.get(index)
    }

    /// Cells bound to `name`.
    pub fn cells_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RenderedCell> {
        self.cells
            .iter()
            .filter(move |c| c.variable.as_deref() == Some(name))
    }
}

/// Parses `table_content` and shows every bound cell's current value.
///
/// In author mode every non-image cell is editable and a cell reading
/// `{{name}}` is bound to `name` when that variable exists. In display mode
/// only cells bound to an independent variable are editable.
pub fn render(table_content: &str, variables: &VariableSet, mode: Mode) -> EngineResult<RenderedTable> {
    let mut fragment = TableFragment::parse(table_content)?;
    let cells = render_fragment(&mut fragment, variables, mode);
    Ok(RenderedTable {
        html: fragment.to_html(),
        cells,
    })
}

/// [`render`] over an already parsed fragment, updating it in place.
pub fn render_fragment(fragment: &mut TableFragment, variables: &VariableSet, mode: Mode) -> Vec<RenderedCell> {
    fragment
        .cells_mut()
        .enumerate()
        .map(|(index, cell)| render_cell(index, cell, variables, mode))
        .collect()
}

fn render_cell(index: usize, cell: &mut Cell, variables: &VariableSet, mode: Mode) -> RenderedCell {
    if cell.has_image() {
        cell.set_attr(EDITABLE_ATTR, "false");
        return RenderedCell {
            index,
            variable: cell.bound_variable().map(str::to_string),
            text: cell.text().to_string(),
            flags: CellFlags::IMAGE,
            hover: None,
        };
    }

    if mode == Mode::Author && cell.bound_variable().is_none() {
        if let Some(name) = reference_name(cell.text().trim()) {
            if variables.contains(name) {
                let name = name.to_string();
                cell.bind(&name);
            }
        }
    }

    let bound = cell.bound_variable().and_then(|name| variables.get(name));
    let mut flags = CellFlags::empty();
    let mut hover = None;

    match bound {
        Some(variable) => {
            cell.set_text(&variable.display_value());
            flags |= CellFlags::BOUND;
            if variable.is_out_of_range() {
                flags |= CellFlags::OUT_OF_RANGE;
            }
            if mode == Mode::Author || variable.is_independent() {
                flags |= CellFlags::EDITABLE;
            }
            hover = Some(HoverInfo::from(variable));
        }
        None if mode == Mode::Author => flags |= CellFlags::EDITABLE,
        None => {}
    }

    let editable = if flags.contains(CellFlags::EDITABLE) { "true" } else { "false" };
    cell.set_attr(EDITABLE_ATTR, editable);
    if flags.contains(CellFlags::OUT_OF_RANGE) {
        cell.set_attr(OUT_OF_RANGE_ATTR, "true");
    } else {
        cell.remove_attr(OUT_OF_RANGE_ATTR);
    }

    RenderedCell {
        index,
        variable: bound.map(|v| v.name.clone()),
        text: cell.text().to_string(),
        flags,
        hover,
    }
}
