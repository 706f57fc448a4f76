//! Shortest transition sequence between two nodes.
//!
//! Breadth-first over the directed transitions of a `NavIndex`. Outgoing
//! transitions are visited in (edge id, action set id) order and the first
//! discovery of a node wins, so equal-length alternatives always resolve the
//! same way.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use navgraph_core::error::{NavError, Result};

use crate::graph::{NavIndex, Transition};

/// One hop of a computed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub edge_id: String,
    pub action_set_id: String,
    pub from: String,
    pub to: String,
}

impl From<&Transition> for PathStep {
    fn from(t: &Transition) -> Self {
        Self {
            edge_id: t.edge_id.clone(),
            action_set_id: t.action_set_id.clone(),
            from: t.from.clone(),
            to: t.to.clone(),
        }
    }
}

/// Find the shortest path from `from` to `to`.
///
/// Returns an empty path when both ids are the same node, and
/// `NavError::PathNotFound` when `to` is unreachable or either id is unknown.
pub fn find_path(index: &NavIndex, from: &str, to: &str) -> Result<Vec<PathStep>> {
    let not_found = || NavError::PathNotFound {
        from: from.to_string(),
        to: to.to_string(),
    };

    if index.node(from).is_none() || index.node(to).is_none() {
        return Err(not_found());
    }
    if from == to {
        return Ok(vec![]);
    }

    // Node id -> transition that first reached it.
    let mut parents: HashMap<&str, &Transition> = HashMap::new();
    let mut queue = VecDeque::from([from]);

    while let Some(current) = queue.pop_front() {
        for transition in index.outgoing(current) {
            let next = transition.to.as_str();
            if next == from || parents.contains_key(next) {
                continue;
            }
            parents.insert(next, transition);
            if next == to {
                return Ok(unwind(&parents, from, to));
            }
            queue.push_back(next);
        }
    }

    tracing::debug!(from, to, tree_id = %index.tree_id(), "No path found");
    Err(not_found())
}

fn unwind(parents: &HashMap<&str, &Transition>, from: &str, to: &str) -> Vec<PathStep> {
    let mut steps = Vec::new();
    let mut node = to;
    while node != from {
        let Some(transition) = parents.get(node) else {
            break;
        };
        steps.push(PathStep::from(*transition));
        node = transition.from.as_str();
    }
    steps.reverse();
    steps
}
