//! Shapes of the test payload served by the backend.
//!
//! `GET test(id)` returns a [`TestRecord`]: the test's identity, its content
//! elements and its variables. Loading is forgiving: missing or null fields
//! take defaults and elements of an unknown type are dropped.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::variable::VariableSet;

/// Reads `null` as the type's default.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A sentence, title or image element. Images carry their URL as content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default, deserialize_with = "null_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_default")]
    pub important: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub position: Option<i64>,
    /// HTML fragment with the table and its variable-bound cells.
    #[serde(default, deserialize_with = "null_default")]
    pub table_content: String,
    /// Page side the table is laid out on.
    #[serde(default, deserialize_with = "null_default")]
    pub side: String,
    #[serde(default, deserialize_with = "null_default")]
    pub important: bool,
}

/// One ordered content unit of a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Sentence(TextElement),
    Title(TextElement),
    Image(TextElement),
    Table(TableElement),
}

impl Element {
    pub fn position(&self) -> i64 {
        let position = match self {
            Element::Sentence(e) | Element::Title(e) | Element::Image(e) => e.position,
            Element::Table(t) => t.position,
        };
        position.unwrap_or(0)
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Element::Sentence(e) | Element::Title(e) | Element::Image(e) => e.id,
            Element::Table(t) => t.id,
        }
    }

    pub fn as_table(&self) -> Option<&TableElement> {
        match self {
            Element::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut TableElement> {
        match self {
            Element::Table(t) => Some(t),
            _ => None,
        }
    }
}

/// Keeps the elements that parse, ordered by position.
fn elements<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Element>, D::Error> {
    let raw: Vec<serde_json::Value> = null_default(deserializer)?;
    let mut elements: Vec<Element> = raw
        .into_iter()
        .filter(|value| !value.is_null())
        .filter_map(|value| match serde_json::from_value::<Element>(value) {
            Ok(element) => Some(element),
            Err(err) => {
                warn!(error = %err, "dropping unreadable element");
                None
            }
        })
        .collect();
    // stable: equal positions keep backend order
    elements.sort_by_key(Element::position);
    Ok(elements)
}

/// A test as loaded for editing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "null_default")]
    pub test_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub test_code: String,
    #[serde(default, deserialize_with = "elements")]
    pub elements: Vec<Element>,
    #[serde(default, deserialize_with = "null_default")]
    pub variables: VariableSet,
}

impl TestRecord {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Table elements with their index in [`TestRecord::elements`].
    pub fn tables(&self) -> impl Iterator<Item = (usize, &TableElement)> {
        self.elements
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_table().map(|t| (i, t)))
    }
}
