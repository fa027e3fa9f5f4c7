//! Variables embedded in table elements.
//!
//! A table element stores an HTML fragment. Cells carrying a
//! `data-variable="name"` attribute show that variable's value; in author
//! mode a cell can also be typed as `name = expr`, `name =` or `{{name}}` to
//! define or bind a variable. The variable set stays authoritative: HTML is
//! regenerated from it by [`render`] and only read back at [`commit_cell`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod commit;
pub mod fragment;
pub mod render;

pub use commit::{CommitOutcome, commit_cell};
pub use fragment::{BINDING_ATTR, Cell, TableFragment};
pub use render::{CellFlags, HoverInfo, RenderedCell, RenderedTable, render, render_fragment};

/// Who is looking at the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Filling in a result sheet: only values of independent variables change.
    #[default]
    Display,
    /// Designing the test: cells may define and bind variables.
    Author,
}

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{(.*?)\}\}$").expect("valid reference pattern"));

/// The name inside a `{{name}}` cell, if `text` is one.
pub fn reference_name(text: &str) -> Option<&str> {
    REFERENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_name() {
        assert_eq!(reference_name("{{Area}}"), Some("Area"));
        assert_eq!(reference_name("{{ L }}"), Some("L"));
        assert_eq!(reference_name("{{}}"), None);
        assert_eq!(reference_name("x {{L}}"), None);
        assert_eq!(reference_name("Area"), None);
    }
}
