//! Navigation graph data model.
//!
//! A graph describes every reachable screen of a device UI as a `Node` and
//! every transition as an `Edge` carrying one or more `ActionSet`s. Graphs are
//! authored elsewhere and are read-only to the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Role of a node within the navigation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    Screen,
    Focus,
    Action,
    Verification,
    Success,
    Failure,
}

impl NodeKind {
    /// Whether this node ends a test flow.
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeKind::Success | NodeKind::Failure)
    }
}

/// Layout position. Presentation only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A check run on arrival at a node. Opaque to the engine; interpreted by the
/// `Verifier` collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    /// Verification command (e.g. "image_match", "text_present").
    pub command: String,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl Verification {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// A screen or focus position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the graph.
    pub id: String,
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    /// Checks confirming arrival at this node.
    #[serde(default)]
    pub verifications: Vec<Verification>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            kind,
            position: Position::default(),
            verifications: vec![],
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    pub fn with_verification(mut self, verification: Verification) -> Self {
        self.verifications.push(verification);
        self
    }
}

/// A single device command. Semantics belong to the device driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub command: String,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    /// Wait after the action completes, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl Action {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: BTreeMap::new(),
            delay_ms: None,
        }
    }

    /// Shorthand for a remote-control key press.
    pub fn key(key: &str) -> Self {
        Self::new("press_key").with_param("key", serde_json::json!(key))
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    /// Short description used in logs and traces.
    pub fn describe(&self) -> String {
        match self.params.get("key").and_then(|v| v.as_str()) {
            Some(key) => format!("{}({})", self.command, key),
            None => self.command.clone(),
        }
    }
}

/// Which way an action set moves along its edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Moves from the edge's source to its target.
    #[default]
    Forward,
    /// Moves from the edge's target back to its source.
    Back,
}

/// A named bundle of action lists realizing one direction of an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSet {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Run before each re-attempt of `actions`.
    #[serde(default)]
    pub retry_actions: Vec<Action>,
    /// Best-effort cleanup once retries are exhausted.
    #[serde(default)]
    pub failure_actions: Vec<Action>,
    /// Overrides the caller's retry budget for this set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_budget: Option<u32>,
}

impl ActionSet {
    pub fn new(id: impl Into<String>, direction: Direction) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            direction,
            actions: vec![],
            retry_actions: vec![],
            failure_actions: vec![],
            retry_budget: None,
        }
    }

    pub fn forward(id: impl Into<String>) -> Self {
        Self::new(id, Direction::Forward)
    }

    pub fn back(id: impl Into<String>) -> Self {
        Self::new(id, Direction::Back)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_retry_actions(mut self, actions: Vec<Action>) -> Self {
        self.retry_actions = actions;
        self
    }

    pub fn with_failure_actions(mut self, actions: Vec<Action>) -> Self {
        self.failure_actions = actions;
        self
    }

    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = Some(budget);
        self
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub action_sets: Vec<ActionSet>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            action_sets: vec![],
        }
    }

    pub fn with_action_set(mut self, set: ActionSet) -> Self {
        self.action_sets.push(set);
        self
    }

    /// Node reached by running `set` along this edge, and the node it starts from.
    pub fn endpoints(&self, direction: Direction) -> (&str, &str) {
        match direction {
            Direction::Forward => (&self.source, &self.target),
            Direction::Back => (&self.target, &self.source),
        }
    }
}

/// A complete navigation tree for one device UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub tree_id: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(tree_id: impl Into<String>) -> Self {
        Self {
            tree_id: tree_id.into(),
            nodes: vec![],
            edges: vec![],
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_builder() {
        let node = Node::new("home", NodeKind::Focus)
            .with_label("Home")
            .with_position(10.0, 20.0)
            .with_verification(Verification::new("text_present"));

        assert_eq!(node.id, "home");
        assert_eq!(node.label, "Home");
        assert_eq!(node.position, Position { x: 10.0, y: 20.0 });
        assert_eq!(node.verifications.len(), 1);
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(NodeKind::Success.is_terminal());
        assert!(NodeKind::Failure.is_terminal());
        assert!(!NodeKind::Start.is_terminal());
        assert!(!NodeKind::Screen.is_terminal());
    }

    #[test]
    fn test_edge_endpoints_follow_direction() {
        let edge = Edge::new("e1", "home", "guide");
        assert_eq!(edge.endpoints(Direction::Forward), ("home", "guide"));
        assert_eq!(edge.endpoints(Direction::Back), ("guide", "home"));
    }

    #[test]
    fn test_action_describe() {
        assert_eq!(Action::key("OK").describe(), "press_key(OK)");
        assert_eq!(Action::new("tap").describe(), "tap");
    }

    #[test]
    fn test_graph_deserializes_with_defaults() {
        let json = r#"{
            "tree_id": "tv",
            "nodes": [
                {"id": "entry", "kind": "start"},
                {"id": "home", "kind": "focus", "label": "Home"}
            ],
            "edges": [
                {"id": "e1", "source": "entry", "target": "home",
                 "action_sets": [{"id": "go", "actions": [{"command": "press_key", "params": {"key": "HOME"}}]}]}
            ]
        }"#;
        let graph: Graph = serde_json::from_str(json).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].kind, NodeKind::Start);
        let set = &graph.edges[0].action_sets[0];
        assert_eq!(set.direction, Direction::Forward);
        assert!(set.retry_actions.is_empty());
        assert_eq!(set.retry_budget, None);
        assert_eq!(set.actions[0].describe(), "press_key(HOME)");
    }
}
