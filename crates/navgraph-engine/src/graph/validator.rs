//! Structural checks over a navigation graph.
//!
//! Every check runs on every call; the report lists all violations found,
//! in a stable order (node checks, then edge checks, then graph-wide checks).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use navgraph_core::graph::{Graph, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    EmptyNodeId,
    DuplicateNodeId,
    EmptyEdgeId,
    DuplicateEdgeId,
    UnknownSource,
    UnknownTarget,
    NoActionSets,
    DuplicateActionSetId,
    MissingStart,
    MultipleStarts,
    MissingTerminal,
}

/// A single invariant violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub code: ViolationCode,
    pub message: String,
    pub node_id: Option<String>,
    pub edge_id: Option<String>,
}

impl Violation {
    fn graph(code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            node_id: None,
            edge_id: None,
        }
    }

    fn node(code: ViolationCode, node_id: &str, message: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.to_string()),
            ..Self::graph(code, message)
        }
    }

    fn edge(code: ViolationCode, edge_id: &str, message: impl Into<String>) -> Self {
        Self {
            edge_id: Some(edge_id.to_string()),
            ..Self::graph(code, message)
        }
    }
}

/// Result of validating a graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human-readable messages in report order.
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.message.clone()).collect()
    }

    /// Violations with the given code.
    pub fn with_code(&self, code: ViolationCode) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.code == code).collect()
    }
}

/// Check every graph invariant and report all violations.
pub fn validate(graph: &Graph) -> ValidationReport {
    let mut violations = Vec::new();

    let mut node_ids = HashSet::new();
    let mut reported_nodes = HashSet::new();
    for node in &graph.nodes {
        if node.id.trim().is_empty() {
            violations.push(Violation::graph(
                ViolationCode::EmptyNodeId,
                format!("node labelled '{}' has an empty id", node.label),
            ));
            continue;
        }
        if !node_ids.insert(node.id.as_str()) && reported_nodes.insert(node.id.as_str()) {
            violations.push(Violation::node(
                ViolationCode::DuplicateNodeId,
                &node.id,
                format!("duplicate node id '{}'", node.id),
            ));
        }
    }

    let mut edge_ids = HashSet::new();
    let mut reported_edges = HashSet::new();
    for edge in &graph.edges {
        if edge.id.trim().is_empty() {
            violations.push(Violation::graph(
                ViolationCode::EmptyEdgeId,
                format!("edge {} -> {} has an empty id", edge.source, edge.target),
            ));
        } else if !edge_ids.insert(edge.id.as_str()) && reported_edges.insert(edge.id.as_str()) {
            violations.push(Violation::edge(
                ViolationCode::DuplicateEdgeId,
                &edge.id,
                format!("duplicate edge id '{}'", edge.id),
            ));
        }

        if !node_ids.contains(edge.source.as_str()) {
            violations.push(Violation::edge(
                ViolationCode::UnknownSource,
                &edge.id,
                format!("edge '{}' source '{}' does not exist", edge.id, edge.source),
            ));
        }
        if !node_ids.contains(edge.target.as_str()) {
            violations.push(Violation::edge(
                ViolationCode::UnknownTarget,
                &edge.id,
                format!("edge '{}' target '{}' does not exist", edge.id, edge.target),
            ));
        }

        if edge.action_sets.is_empty() {
            violations.push(Violation::edge(
                ViolationCode::NoActionSets,
                &edge.id,
                format!("edge '{}' has no action sets", edge.id),
            ));
        }
        let mut set_ids = HashSet::new();
        for set in &edge.action_sets {
            if !set_ids.insert(set.id.as_str()) {
                violations.push(Violation::edge(
                    ViolationCode::DuplicateActionSetId,
                    &edge.id,
                    format!("edge '{}' repeats action set id '{}'", edge.id, set.id),
                ));
            }
        }
    }

    let starts: Vec<&str> = graph
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Start)
        .map(|n| n.id.as_str())
        .collect();
    match starts.len() {
        0 => violations.push(Violation::graph(
            ViolationCode::MissingStart,
            "missing start node",
        )),
        1 => {}
        _ => violations.push(Violation::graph(
            ViolationCode::MultipleStarts,
            format!("multiple start nodes: {}", starts.join(", ")),
        )),
    }

    if !graph.nodes.iter().any(|n| n.kind.is_terminal()) {
        violations.push(Violation::graph(
            ViolationCode::MissingTerminal,
            "missing terminal node (success or failure)",
        ));
    }

    ValidationReport { violations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navgraph_core::graph::{Action, ActionSet, Edge, Node};

    fn valid_graph() -> Graph {
        Graph::new("tv")
            .with_node(Node::new("entry", NodeKind::Start))
            .with_node(Node::new("home", NodeKind::Focus))
            .with_node(Node::new("done", NodeKind::Success))
            .with_edge(
                Edge::new("e1", "entry", "home")
                    .with_action_set(ActionSet::forward("go").with_actions(vec![Action::key("HOME")])),
            )
            .with_edge(Edge::new("e2", "home", "done").with_action_set(ActionSet::forward("end")))
    }

    #[test]
    fn test_valid_graph_has_no_violations() {
        let report = validate(&valid_graph());
        assert!(report.is_valid(), "{:?}", report.messages());
    }

    #[test]
    fn test_missing_start_reported_once() {
        let mut graph = valid_graph();
        graph.nodes[0].kind = NodeKind::Screen;
        let report = validate(&graph);
        assert_eq!(report.with_code(ViolationCode::MissingStart).len(), 1);
        assert_eq!(
            report
                .messages()
                .iter()
                .filter(|m| m.as_str() == "missing start node")
                .count(),
            1
        );
    }

    #[test]
    fn test_multiple_starts() {
        let graph = valid_graph().with_node(Node::new("entry2", NodeKind::Start));
        let report = validate(&graph);
        assert_eq!(report.with_code(ViolationCode::MultipleStarts).len(), 1);
        assert!(report.with_code(ViolationCode::MissingStart).is_empty());
    }

    #[test]
    fn test_all_violations_reported_together() {
        let graph = Graph::new("broken")
            .with_node(Node::new("a", NodeKind::Screen))
            .with_node(Node::new("a", NodeKind::Screen))
            .with_edge(Edge::new("e1", "a", "ghost").with_action_set(ActionSet::forward("x")))
            .with_edge(Edge::new("e1", "nowhere", "a"));

        let report = validate(&graph);
        let codes: Vec<ViolationCode> = report.violations.iter().map(|v| v.code).collect();
        assert_eq!(
            codes,
            vec![
                ViolationCode::DuplicateNodeId,
                ViolationCode::UnknownTarget,
                ViolationCode::DuplicateEdgeId,
                ViolationCode::UnknownSource,
                ViolationCode::NoActionSets,
                ViolationCode::MissingStart,
                ViolationCode::MissingTerminal,
            ]
        );
        assert!(!report.is_valid());
    }

    #[test]
    fn test_duplicate_id_reported_once_per_id() {
        let graph = valid_graph()
            .with_node(Node::new("home", NodeKind::Focus))
            .with_node(Node::new("home", NodeKind::Focus));
        let report = validate(&graph);
        assert_eq!(report.with_code(ViolationCode::DuplicateNodeId).len(), 1);
    }

    #[test]
    fn test_duplicate_action_set_ids() {
        let mut graph = valid_graph();
        graph.edges[0]
            .action_sets
            .push(ActionSet::back("go").with_actions(vec![Action::key("BACK")]));
        let report = validate(&graph);
        let dupes = report.with_code(ViolationCode::DuplicateActionSetId);
        assert_eq!(dupes.len(), 1);
        assert_eq!(dupes[0].edge_id.as_deref(), Some("e1"));
    }
}
