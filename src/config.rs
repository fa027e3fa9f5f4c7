//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::engine::ParseLimits;

/// How far an edit propagates through dependent variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Legacy behaviour: `resolve_all` is one in-order pass and an edit
    /// recomputes only the variables that reference the edited name.
    #[default]
    OneHop,
    /// Dependency-graph behaviour: topological order, full dependent closure,
    /// cycles reported.
    Transitive,
}

/// Settings shared by every operation of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub propagation: Propagation,
    /// Longest formula accepted by the parser, in bytes.
    pub max_expression_len: usize,
    /// Deepest parenthesis / operator nesting accepted by the parser.
    pub max_recursion_depth: usize,
    /// Substitute negative values as `(-v)` so that `x^2` squares the value.
    pub wrap_negative_values: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let limits = ParseLimits::default();
        Self {
            propagation: Propagation::default(),
            max_expression_len: limits.max_len,
            max_recursion_depth: limits.max_depth,
            wrap_negative_values: true,
        }
    }
}

impl EngineConfig {
    /// Legacy one-hop propagation with default limits.
    pub fn one_hop() -> Self {
        Self::default()
    }

    /// Transitive propagation with default limits.
    pub fn transitive() -> Self {
        Self {
            propagation: Propagation::Transitive,
            ..Self::default()
        }
    }

    /// Reads a configuration from JSON; missing keys take their defaults.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn parse_limits(&self) -> ParseLimits {
        ParseLimits {
            max_len: self.max_expression_len,
            max_depth: self.max_recursion_depth,
        }
    }
}
