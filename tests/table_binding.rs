//! Table rendering and cell commits against a live variable set.

mod test_helpers;

use fiche_rs::config::EngineConfig;
use fiche_rs::table::render::CellFlags;
use fiche_rs::table::{CommitOutcome, Mode, TableFragment, commit_cell, render};
use fiche_rs::variable::{Variable, VariableSet};
use pretty_assertions::assert_eq;
use test_helpers::{plate, table_row, vars};

fn plate_table() -> String {
    table_row(&[
        "<td>Plate</td>",
        r#"<td data-variable="L">?</td>"#,
        r#"<td data-variable="W">?</td>"#,
        r#"<td data-variable="Area">?</td>"#,
    ])
}

// Rendering

#[test]
fn test_render_shows_current_values() {
    let mut set = plate();
    fiche_rs::resolve_all(&mut set, &EngineConfig::default());

    let table = render(&plate_table(), &set, Mode::Display).unwrap();
    let texts: Vec<&str> = table.cells.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["Plate", "200", "100", "20000"]);

    assert!(!table.cell(0).unwrap().is_editable());
    assert!(table.cell(1).unwrap().is_editable());
    assert!(!table.cell(3).unwrap().is_editable());
    assert!(table.html.contains(r#"data-variable="Area" contenteditable="false">20000</td>"#));
}

#[test]
fn test_render_marks_out_of_range() {
    let set: VariableSet = vars(&[("t", "15", 15.0)])
        .into_iter()
        .map(|v| v.with_bounds(Some(0.0), Some(10.0)).with_unit("degC"))
        .collect();
    let table = render(&table_row(&[r#"<td data-variable="t">0</td>"#]), &set, Mode::Display).unwrap();

    let cell = table.cell(0).unwrap();
    assert!(cell.is_out_of_range());
    assert_eq!(cell.hover.as_ref().unwrap().unit.as_deref(), Some("degC"));
    assert!(table.html.contains(r#"data-out-of-range="true""#));
}

#[test]
fn test_author_mode_binds_references() {
    let set = plate();
    let html = table_row(&["<td>{{W}}</td>", "<td>{{nobody}}</td>"]);
    let table = render(&html, &set, Mode::Author).unwrap();

    assert_eq!(table.cell(0).unwrap().variable.as_deref(), Some("W"));
    assert_eq!(table.cell(0).unwrap().text, "100");
    assert_eq!(table.cell(1).unwrap().variable, None);
    assert_eq!(table.cell(1).unwrap().text, "{{nobody}}");
    assert!(table.cells.iter().all(|c| c.is_editable()));
    assert_eq!(table.cells_for("W").count(), 1);
}

#[test]
fn test_image_cells_are_inert() {
    let set = plate();
    let html = table_row(&[r#"<td><img src="plate.png"/></td>"#]);
    for mode in [Mode::Display, Mode::Author] {
        let table = render(&html, &set, mode).unwrap();
        assert_eq!(table.cell(0).unwrap().flags, CellFlags::IMAGE);
    }

    let mut fragment = TableFragment::parse(&html).unwrap();
    let mut set = plate();
    let outcome =
        commit_cell(&mut fragment, 0, "x = 1", &mut set, Mode::Author, &EngineConfig::default()).unwrap();
    assert_eq!(outcome, CommitOutcome::Ignored);
    assert!(!set.contains("x"));
}

#[test]
fn test_render_repairs_unclosed_cells() {
    let set = plate();
    for html in [
        r#"<table><tr><td>a<td data-variable="W">b</tr></table>"#,
        r#"<table><tr><td>a < b</td><td data-variable="W">b</td></tr></table>"#,
    ] {
        let table = render(html, &set, Mode::Display).unwrap();
        assert_eq!(table.cells.len(), 2, "{html}");
        assert_eq!(table.cell(1).unwrap().text, "100");
        assert!(table.html.ends_with("</td></tr></table>"), "{}", table.html);
        assert_eq!(table.html.matches("</td>").count(), 2);
    }
}

// Commits

#[test]
fn test_value_edit_through_cell_recomputes() {
    let config = EngineConfig::default();
    let mut set = plate();
    fiche_rs::resolve_all(&mut set, &config);
    let mut fragment = TableFragment::parse(&plate_table()).unwrap();

    let outcome = commit_cell(&mut fragment, 1, " 50 ", &mut set, Mode::Display, &config).unwrap();
    match outcome {
        CommitOutcome::ValueEdited { name, report } => {
            assert_eq!(name, "L");
            assert_eq!(report.changed, vec!["L", "Area"]);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(set.value("Area"), Some(5000.0));
    assert_eq!(fragment.cell(1).unwrap().text(), "50");

    // the other cells pick the new value up on the next render
    let table = render(&fragment.to_html(), &set, Mode::Display).unwrap();
    assert_eq!(table.cell(3).unwrap().text, "5000");
}

#[test]
fn test_non_numeric_value_reverts() {
    let config = EngineConfig::default();
    let mut set = plate();
    let mut fragment = TableFragment::parse(&plate_table()).unwrap();

    let outcome = commit_cell(&mut fragment, 2, "wide", &mut set, Mode::Display, &config).unwrap();
    assert_eq!(outcome, CommitOutcome::Reverted { name: "W".into() });
    assert_eq!(set.value("W"), Some(100.0));
    assert_eq!(fragment.cell(2).unwrap().text(), "100");
}

#[test]
fn test_define_variable_from_cell() {
    let config = EngineConfig::default();
    let mut set = plate();
    fiche_rs::resolve_all(&mut set, &config);
    let mut fragment = TableFragment::parse(&table_row(&["<td></td>"])).unwrap();

    let outcome = commit_cell(&mut fragment, 0, "Perimeter = 2*(L+W)", &mut set, Mode::Author, &config).unwrap();
    assert!(matches!(
        outcome,
        CommitOutcome::Defined { ref name, created: true, value, .. } if name == "Perimeter" && value == 600.0
    ));
    let cell = fragment.cell(0).unwrap();
    assert_eq!(cell.bound_variable(), Some("Perimeter"));
    assert_eq!(cell.text(), "600");
    assert_eq!(set.get("Perimeter").unwrap().expression, "2*(L+W)");
}

#[test]
fn test_redefinition_reaches_dependents() {
    let config = EngineConfig::default();
    let mut set = plate();
    fiche_rs::resolve_all(&mut set, &config);
    let mut fragment = TableFragment::parse(&table_row(&["<td></td>"])).unwrap();

    let outcome = commit_cell(&mut fragment, 0, "W = L / 4", &mut set, Mode::Author, &config).unwrap();
    assert_eq!(outcome.changed_names(), vec!["W", "Area"]);
    assert_eq!(set.value("W"), Some(50.0));
    assert_eq!(set.value("Area"), Some(10000.0));
}

#[test]
fn test_failed_definition_is_an_error() {
    let config = EngineConfig::default();
    let mut set = plate();
    let mut fragment = TableFragment::parse(&table_row(&["<td>keep</td>"])).unwrap();

    let err = commit_cell(&mut fragment, 0, "X = L * ghost", &mut set, Mode::Author, &config).unwrap_err();
    assert_eq!(err.to_string(), "Missing variable: 'ghost'");
    assert!(!set.contains("X"));
    assert_eq!(fragment.cell(0).unwrap().text(), "keep");
}

#[test]
fn test_declaration_and_reference() {
    let config = EngineConfig::default();
    let mut set = plate();
    let mut fragment = TableFragment::parse(&table_row(&["<td></td>", "<td></td>"])).unwrap();

    let outcome = commit_cell(&mut fragment, 0, "T =", &mut set, Mode::Author, &config).unwrap();
    assert_eq!(
        outcome,
        CommitOutcome::Declared {
            name: "T".into(),
            created: true
        }
    );
    assert_eq!(set.get("T"), Some(&Variable::literal("T", 0.0)));

    let outcome = commit_cell(&mut fragment, 1, "{{L}}", &mut set, Mode::Author, &config).unwrap();
    assert_eq!(outcome, CommitOutcome::Bound { name: "L".into() });
    assert_eq!(fragment.cell(1).unwrap().text(), "200");

    // display mode ignores authoring syntax
    let mut fragment = TableFragment::parse(&table_row(&["<td>note</td>"])).unwrap();
    let outcome = commit_cell(&mut fragment, 0, "Z = 3", &mut set, Mode::Display, &config).unwrap();
    assert_eq!(outcome, CommitOutcome::Ignored);
    assert!(!set.contains("Z"));
    assert_eq!(fragment.cell(0).unwrap().text(), "note");
}
