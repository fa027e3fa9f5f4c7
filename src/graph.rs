//! Reference graph between the variables of one set.
//!
//! Nodes are indices into a [`VariableSet`]; an edge `p -> d` means the
//! formula of `d` references `p`. References to names outside the set are not
//! edges (they fail later, at evaluation).

use std::collections::{BTreeSet, VecDeque};

use crate::resolver::referenced_names;
use crate::variable::VariableSet;

/// Result of ordering a graph for recomputation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalcOrder {
    /// Indices whose precedents all come earlier in the list.
    pub order: Vec<usize>,
    /// Indices on a cycle or downstream of one, in set order.
    pub blocked: Vec<usize>,
}

impl CalcOrder {
    pub fn has_cycle(&self) -> bool {
        !self.blocked.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    precedents: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn build(variables: &VariableSet) -> Self {
        let len = variables.len();
        let mut precedents = vec![Vec::new(); len];
        let mut dependents = vec![Vec::new(); len];

        for (index, variable) in variables.iter().enumerate() {
            if variable.is_independent() {
                continue;
            }
            for name in referenced_names(&variable.expression) {
                if let Some(precedent) = variables.position(name) {
                    precedents[index].push(precedent);
                    dependents[precedent].push(index);
                }
            }
        }

        Self {
            precedents,
            dependents,
        }
    }

    pub fn len(&self) -> usize {
        self.precedents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precedents.is_empty()
    }

    pub fn precedents_of(&self, index: usize) -> &[usize] {
        self.precedents.get(index).map_or(&[][..], Vec::as_slice)
    }

    pub fn direct_dependents(&self, index: usize) -> &[usize] {
        self.dependents.get(index).map_or(&[][..], Vec::as_slice)
    }

    /// Kahn's algorithm; ties are broken by set order so the result is stable.
    pub fn calc_order(&self) -> CalcOrder {
        let mut in_degree: Vec<usize> = self.precedents.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter_map(|(i, &deg)| (deg == 0).then_some(i))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(node) = ready.pop_first() {
            order.push(node);
            for &dep in &self.dependents[node] {
                in_degree[dep] = in_degree[dep].saturating_sub(1);
                if in_degree[dep] == 0 {
                    ready.insert(dep);
                }
            }
        }

        let blocked = in_degree
            .iter()
            .enumerate()
            .filter_map(|(i, &deg)| (deg > 0).then_some(i))
            .collect();
        CalcOrder { order, blocked }
    }

    /// Everything reachable from `start` through dependent edges, `start`
    /// excluded, in breadth-first order.
    pub fn dependents_closure(&self, start: usize) -> Vec<usize> {
        let mut seen = vec![false; self.len()];
        let mut queue = VecDeque::new();
        let mut closure = Vec::new();
        if let Some(flag) = seen.get_mut(start) {
            *flag = true;
            queue.push_back(start);
        }

        while let Some(node) = queue.pop_front() {
            for &dep in self.direct_dependents(node) {
                if !seen[dep] {
                    seen[dep] = true;
                    closure.push(dep);
                    queue.push_back(dep);
                }
            }
        }
        closure
    }

    /// Members of a cycle reachable from the blocked set, for reporting.
    ///
    /// Blocked nodes that merely depend on a cycle are not included.
    pub fn cycle_members(&self, blocked: &[usize]) -> Vec<usize> {
        let in_blocked = |i: usize| blocked.contains(&i);
        // A blocked node is on a cycle when it can reach itself through blocked nodes.
        blocked
            .iter()
            .copied()
            .filter(|&start| {
                let mut seen = vec![false; self.len()];
                let mut stack: Vec<usize> = self.direct_dependents(start).to_vec();
                while let Some(node) = stack.pop() {
                    if node == start {
                        return true;
                    }
                    if !in_blocked(node) || seen[node] {
                        continue;
                    }
                    seen[node] = true;
                    stack.extend_from_slice(self.direct_dependents(node));
                }
                false
            })
            .collect()
    }
}
