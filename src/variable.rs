//! Variables of one test and the ordered set that owns them.
//!
//! A [`VariableSet`] is the authoritative in-memory state of an editing
//! session. Names are unique within a set; order is the order the backend
//! returned, and it matters for the single-pass recompute.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::Real;
use crate::error::{EngineError, EngineResult};

static LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d*\.?\d+$").expect("valid literal pattern"));

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*$").expect("valid identifier pattern"));

/// True when `expression` is a bare unsigned numeral (`5`, `.5`, `12.75`).
///
/// Signed values such as `-3` do not qualify; a variable holding one behaves
/// as a (constant) formula.
pub fn is_literal(expression: &str) -> bool {
    LITERAL.is_match(expression)
}

/// True when `name` can be used as a variable name inside formulas.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Formats a value the way cells and literal expressions show it.
pub fn format_value(value: Real) -> String {
    format!("{value}")
}

/// Position of a value relative to a variable's optional bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStatus {
    Within,
    BelowMin,
    AboveMax,
}

impl RangeStatus {
    /// Bounds are inclusive and open-ended when absent; NaN is never flagged.
    pub fn classify(value: Real, min: Option<Real>, max: Option<Real>) -> Self {
        if value.is_nan() {
            return RangeStatus::Within;
        }
        match (min, max) {
            (Some(min), _) if value < min => RangeStatus::BelowMin,
            (_, Some(max)) if value > max => RangeStatus::AboveMax,
            _ => RangeStatus::Within,
        }
    }

    pub fn is_out_of_range(self) -> bool {
        self != RangeStatus::Within
    }
}

/// A named computed quantity belonging to a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Identity assigned by the backend; absent until first saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    /// A bare numeral (independent) or a formula over other variables.
    #[serde(default, deserialize_with = "lenient::string")]
    pub expression: String,
    #[serde(default, deserialize_with = "lenient::real")]
    pub computed_value: Real,
    #[serde(default, deserialize_with = "lenient::bound")]
    pub min: Option<Real>,
    #[serde(default, deserialize_with = "lenient::bound")]
    pub max: Option<Real>,
    #[serde(default, deserialize_with = "lenient::unit")]
    pub unit: Option<String>,
}

impl Variable {
    /// A not-yet-saved variable with the given formula and cached value.
    pub fn new(name: impl Into<String>, expression: impl Into<String>, computed_value: Real) -> Self {
        Self {
            id: None,
            name: name.into(),
            expression: expression.into(),
            computed_value,
            min: None,
            max: None,
            unit: None,
        }
    }

    /// An independent variable holding `value`.
    pub fn literal(name: impl Into<String>, value: Real) -> Self {
        Self::new(name, format_value(value), value)
    }

    pub fn with_bounds(mut self, min: Option<Real>, max: Option<Real>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Independent variables are edited directly; the rest are computed.
    pub fn is_independent(&self) -> bool {
        is_literal(&self.expression)
    }

    pub fn range_status(&self) -> RangeStatus {
        RangeStatus::classify(self.computed_value, self.min, self.max)
    }

    pub fn is_out_of_range(&self) -> bool {
        self.range_status().is_out_of_range()
    }

    pub fn display_value(&self) -> String {
        format_value(self.computed_value)
    }
}

/// Changes to a variable's display metadata. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundsUpdate {
    pub min: Option<Real>,
    pub max: Option<Real>,
    pub unit: Option<String>,
}

/// Ordered variables of one test, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Variable>", into = "Vec<Variable>")]
pub struct VariableSet {
    variables: Vec<Variable>,
}

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from backend records. Later duplicates of a name are dropped.
    pub fn from_vec(variables: Vec<Variable>) -> Self {
        let mut set = Self::new();
        for variable in variables {
            if set.contains(&variable.name) {
                tracing::warn!(name = %variable.name, "dropping duplicate variable");
                continue;
            }
            set.variables.push(variable);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.variables.iter()
    }

    pub fn as_slice(&self) -> &[Variable] {
        &self.variables
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    pub fn at(&self, index: usize) -> Option<&Variable> {
        self.variables.get(index)
    }

    pub(crate) fn at_mut(&mut self, index: usize) -> Option<&mut Variable> {
        self.variables.get_mut(index)
    }

    /// Current value of `name`, if defined.
    pub fn value(&self, name: &str) -> Option<Real> {
        self.get(name).map(|v| v.computed_value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    /// Inserts `variable`, or replaces the formula and value of the variable
    /// with the same name (keeping its id, bounds and unit). Returns true when
    /// the name was new.
    pub fn upsert(&mut self, variable: Variable) -> bool {
        match self.get_mut(&variable.name) {
            Some(existing) => {
                existing.expression = variable.expression;
                existing.computed_value = variable.computed_value;
                if variable.id.is_some() {
                    existing.id = variable.id;
                }
                false
            }
            None => {
                self.variables.push(variable);
                true
            }
        }
    }

    /// Replaces a whole record by name, appending it when unknown.
    pub fn replace(&mut self, variable: Variable) {
        match self.get_mut(&variable.name) {
            Some(existing) => *existing = variable,
            None => self.variables.push(variable),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        let index = self.position(name)?;
        Some(self.variables.remove(index))
    }

    /// Updates min, max and unit of `name`, refusing a resulting `min > max`.
    pub fn set_bounds(&mut self, name: &str, update: BoundsUpdate) -> EngineResult<()> {
        let variable = self.get_mut(name).ok_or_else(|| EngineError::UnknownTarget {
            name: name.to_string(),
        })?;

        if update.min.is_some() || update.max.is_some() {
            let min = update.min.or(variable.min);
            let max = update.max.or(variable.max);
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(EngineError::InvalidBounds { min, max });
                }
            }
            variable.min = min;
            variable.max = max;
        }
        if let Some(unit) = update.unit.filter(|u| !u.is_empty()) {
            variable.unit = Some(unit);
        }
        Ok(())
    }

    pub fn into_vec(self) -> Vec<Variable> {
        self.variables
    }
}

impl From<Vec<Variable>> for VariableSet {
    fn from(variables: Vec<Variable>) -> Self {
        Self::from_vec(variables)
    }
}

impl From<VariableSet> for Vec<Variable> {
    fn from(set: VariableSet) -> Self {
        set.variables
    }
}

impl FromIterator<Variable> for VariableSet {
    fn from_iter<I: IntoIterator<Item = Variable>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl IntoIterator for VariableSet {
    type Item = Variable;
    type IntoIter = std::vec::IntoIter<Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.variables.into_iter()
    }
}

impl<'a> IntoIterator for &'a VariableSet {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.variables.iter()
    }
}

/// Deserializers for the loosely typed fields the backend sends.
///
/// Bounds arrive as numbers, numeric strings, `""` or null; values may be
/// null. Anything unreadable becomes "absent" rather than failing the load.
mod lenient {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(Real),
        Text(String),
    }

    fn to_real(raw: Option<NumberOrText>) -> Option<Real> {
        match raw? {
            NumberOrText::Number(n) => Some(n),
            NumberOrText::Text(s) => s.trim().parse::<Real>().ok().filter(|v| v.is_finite()),
        }
    }

    pub fn real<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Real, D::Error> {
        let raw = Option::<NumberOrText>::deserialize(deserializer)?;
        Ok(to_real(raw).unwrap_or(0.0))
    }

    pub fn bound<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Real>, D::Error> {
        let raw = Option::<NumberOrText>::deserialize(deserializer)?;
        Ok(to_real(raw))
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
    }

    pub fn unit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|u| !u.is_empty()))
    }
}
