//! A full editing session over a test loaded from its backend payload.

use fiche_rs::config::{EngineConfig, Propagation};
use fiche_rs::error::EngineError;
use fiche_rs::record::{Element, TestRecord};
use fiche_rs::session::{MemoryStore, Session};
use fiche_rs::table::{CommitOutcome, Mode};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

const PAYLOAD: &str = r#"{
    "id": 42,
    "testName": "Flexion 3 points",
    "testCode": "FLX-3",
    "elements": [
        {"type": "table", "id": 7, "position": 2, "side": "left",
         "tableContent": "<table><tr><td>L</td><td data-variable=\"L\">0</td><td>Area</td><td data-variable=\"Area\">0</td></tr></table>"},
        {"type": "title", "id": 5, "position": 0, "content": "Eprouvette"},
        null,
        {"type": "video", "position": 1},
        {"type": "sentence", "id": 6, "position": 1, "content": "Mesurer la plaque.", "important": null}
    ],
    "variables": [
        {"id": 1, "name": "L", "expression": "200", "computedValue": 200, "min": null, "max": 150, "unit": "mm"},
        {"id": 2, "name": "W", "expression": "100", "computedValue": "100"},
        {"id": 3, "name": "Area", "expression": "L*W", "computedValue": null}
    ]
}"#;

fn open(config: EngineConfig, store: MemoryStore) -> Session<MemoryStore> {
    let record = TestRecord::from_json(PAYLOAD).unwrap();
    Session::open(record, config, store)
}

#[test]
fn test_load_orders_elements_and_resolves() {
    let session = open(EngineConfig::default(), MemoryStore::new());

    assert_eq!(session.test_id(), Some(42));
    assert_eq!(session.test_name(), "Flexion 3 points");
    let ids: Vec<Option<i64>> = session.elements().iter().map(Element::id).collect();
    assert_eq!(ids, vec![Some(5), Some(6), Some(7)]);

    assert_eq!(session.variables().value("Area"), Some(20000.0));
    assert!(session.load_report().is_clean());
    assert_eq!(session.store().writes().count(), 0);
}

#[test]
fn test_edit_render_commit_cycle() {
    let mut session = open(EngineConfig::default(), MemoryStore::new()).with_user("tech-2");

    let table = session.render_table(2, Mode::Display).unwrap();
    let length = table.cells_for("L").next().unwrap();
    assert!(length.is_out_of_range());
    assert!(length.is_editable());

    let outcome = session.commit_cell(2, 1, "120", Mode::Display).unwrap();
    assert!(matches!(outcome, CommitOutcome::ValueEdited { .. }));
    assert_eq!(session.variables().value("Area"), Some(12000.0));
    assert_eq!(session.store().written_names(), vec!["L", "Area"]);
    assert_eq!(session.store().latest("L").unwrap().id, Some(1));

    // stored HTML follows the commit and the next render clears the range flag
    let table = session.render_table(2, Mode::Display).unwrap();
    assert!(!table.cells_for("L").next().unwrap().is_out_of_range());
    assert_eq!(table.cells_for("Area").next().unwrap().text, "12000");
}

#[test]
fn test_non_table_element_is_rejected() {
    let mut session = open(EngineConfig::default(), MemoryStore::new());
    assert!(matches!(
        session.render_table(0, Mode::Display),
        Err(EngineError::Fragment(_))
    ));
    assert!(session.commit_cell(9, 0, "1", Mode::Display).is_err());
}

#[test]
fn test_rejected_edits_write_nothing() {
    let mut session = open(EngineConfig::default(), MemoryStore::new());
    assert_eq!(
        session.edit_value("Area", "5"),
        Err(EngineError::DependentTarget { name: "Area".into() })
    );
    assert_eq!(
        session.edit_value("L", "long"),
        Err(EngineError::InvalidLiteral { input: "long".into() })
    );
    assert_eq!(session.store().writes().count(), 0);
}

#[test]
fn test_transitive_session() {
    let mut record = TestRecord::from_json(PAYLOAD).unwrap();
    record
        .variables
        .upsert(fiche_rs::Variable::new("Volume", "Area * 2", 0.0));
    let config = EngineConfig {
        propagation: Propagation::Transitive,
        ..Default::default()
    };
    let mut session = Session::open(record, config, MemoryStore::new());
    assert_eq!(session.variables().value("Volume"), Some(40000.0));

    let report = session.edit_value("W", "10").unwrap();
    assert_eq!(report.changed, vec!["W", "Area", "Volume"]);
    assert_eq!(session.variables().value("Volume"), Some(4000.0));
}

#[test]
#[traced_test]
fn test_store_failure_is_logged() {
    let mut session = open(EngineConfig::default(), MemoryStore::rejecting("Area"));
    session.edit_value("L", "10").unwrap();

    assert_eq!(session.variables().value("Area"), Some(1000.0));
    assert_eq!(session.store().written_names(), vec!["L"]);
    assert!(logs_contain("variable write failed"));
}
