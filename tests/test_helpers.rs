use fiche_rs::Real;
use fiche_rs::variable::{Variable, VariableSet};

/// Builds a set from `(name, expression, computed value)` triples.
#[allow(dead_code)]
pub fn vars(entries: &[(&str, &str, Real)]) -> VariableSet {
    entries
        .iter()
        .map(|(name, expression, value)| Variable::new(*name, *expression, *value))
        .collect()
}

/// The plate scenario: `Area = L*W`, stale computed value.
#[allow(dead_code)]
pub fn plate() -> VariableSet {
    vars(&[("L", "200", 200.0), ("W", "100", 100.0), ("Area", "L*W", 0.0)])
}

/// `C -> B -> A`, declared in dependency order.
#[allow(dead_code)]
pub fn chain() -> VariableSet {
    vars(&[("A", "10", 10.0), ("B", "A*2", 0.0), ("C", "B*2", 0.0)])
}

/// A one-row table with the given raw cell contents.
#[allow(dead_code)]
pub fn table_row(cells: &[&str]) -> String {
    let mut html = String::from("<table><tbody><tr>");
    for cell in cells {
        html.push_str(cell);
    }
    html.push_str("</tr></tbody></table>");
    html
}

/// Initializes tracing output for a test run (`RUST_LOG` controls the level).
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
