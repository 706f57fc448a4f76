use std::collections::HashMap;

use navgraph_core::error::{NavError, Result};
use navgraph_core::graph::{ActionSet, Edge, Graph, Node, NodeKind};

use super::validator::validate;

/// One directed move available from a node: run `action_set_id` on
/// `edge_id` to go from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transition {
    pub edge_id: String,
    pub action_set_id: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug)]
struct IndexedEdge {
    edge: Edge,
    /// Action set id -> position in `edge.action_sets`.
    sets: HashMap<String, usize>,
}

/// Validated, read-only lookup structure over a graph.
///
/// Built once per session and shared by reference across navigation calls.
#[derive(Debug)]
pub struct NavIndex {
    tree_id: String,
    start_node: String,
    nodes: HashMap<String, Node>,
    edges: HashMap<String, IndexedEdge>,
    /// Node id -> outgoing transitions sorted by (edge id, action set id).
    outgoing: HashMap<String, Vec<Transition>>,
}

impl NavIndex {
    pub fn tree_id(&self) -> &str {
        &self.tree_id
    }

    pub fn start_node(&self) -> &str {
        &self.start_node
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id).map(|e| &e.edge)
    }

    /// Look up an action set on an edge.
    pub fn action_set(&self, edge_id: &str, action_set_id: &str) -> Result<(&Edge, &ActionSet)> {
        let indexed = self
            .edges
            .get(edge_id)
            .ok_or_else(|| NavError::UnknownEdge(edge_id.to_string()))?;
        let pos = indexed
            .sets
            .get(action_set_id)
            .ok_or_else(|| NavError::UnknownActionSet {
                edge_id: edge_id.to_string(),
                action_set_id: action_set_id.to_string(),
            })?;
        Ok((&indexed.edge, &indexed.edge.action_sets[*pos]))
    }

    /// The transition realized by running an action set on its edge.
    pub fn transition(&self, edge_id: &str, action_set_id: &str) -> Result<Transition> {
        let (edge, set) = self.action_set(edge_id, action_set_id)?;
        let (from, to) = edge.endpoints(set.direction);
        Ok(Transition {
            edge_id: edge.id.clone(),
            action_set_id: set.id.clone(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Moves leaving `node_id`, in deterministic order.
    pub fn outgoing(&self, node_id: &str) -> &[Transition] {
        self.outgoing.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Validate a graph and build its lookup index.
///
/// Fails with `NavError::Validation` carrying every violation if the graph
/// breaks an invariant.
pub fn build_index(graph: &Graph) -> Result<NavIndex> {
    let report = validate(graph);
    if !report.is_valid() {
        return Err(NavError::Validation {
            tree_id: graph.tree_id.clone(),
            violations: report.messages(),
        });
    }

    let nodes: HashMap<String, Node> = graph
        .nodes
        .iter()
        .map(|n| (n.id.clone(), n.clone()))
        .collect();

    // Validation guarantees exactly one start node.
    let start_node = graph
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Start)
        .map(|n| n.id.clone())
        .unwrap_or_default();

    let mut edges = HashMap::with_capacity(graph.edges.len());
    let mut outgoing: HashMap<String, Vec<Transition>> = HashMap::new();

    for edge in &graph.edges {
        let sets = edge
            .action_sets
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        for set in &edge.action_sets {
            let (from, to) = edge.endpoints(set.direction);
            outgoing.entry(from.to_string()).or_default().push(Transition {
                edge_id: edge.id.clone(),
                action_set_id: set.id.clone(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        edges.insert(
            edge.id.clone(),
            IndexedEdge {
                edge: edge.clone(),
                sets,
            },
        );
    }

    for transitions in outgoing.values_mut() {
        transitions.sort_by(|a, b| {
            (a.edge_id.as_str(), a.action_set_id.as_str())
                .cmp(&(b.edge_id.as_str(), b.action_set_id.as_str()))
        });
    }

    tracing::debug!(
        tree_id = %graph.tree_id,
        nodes = nodes.len(),
        edges = edges.len(),
        "Built navigation index"
    );

    Ok(NavIndex {
        tree_id: graph.tree_id.clone(),
        start_node,
        nodes,
        edges,
        outgoing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use navgraph_core::graph::{Action, ActionSet, Edge, Node, NodeKind};

    fn graph() -> Graph {
        Graph::new("tv")
            .with_node(Node::new("entry", NodeKind::Start))
            .with_node(Node::new("home", NodeKind::Focus))
            .with_node(Node::new("home_guide", NodeKind::Focus))
            .with_node(Node::new("done", NodeKind::Success))
            .with_edge(
                Edge::new("e_entry", "entry", "home")
                    .with_action_set(ActionSet::forward("go").with_actions(vec![Action::key("HOME")])),
            )
            .with_edge(
                Edge::new("e_guide", "home", "home_guide")
                    .with_action_set(ActionSet::forward("a1").with_actions(vec![Action::key("RIGHT")]))
                    .with_action_set(ActionSet::back("a2").with_actions(vec![Action::key("LEFT")])),
            )
    }

    #[test]
    fn test_build_index_adjacency() {
        let index = build_index(&graph()).unwrap();
        assert_eq!(index.tree_id(), "tv");
        assert_eq!(index.start_node(), "entry");
        assert_eq!(index.node_count(), 4);

        let from_home = index.outgoing("home");
        assert_eq!(from_home.len(), 1);
        assert_eq!(from_home[0].action_set_id, "a1");
        assert_eq!(from_home[0].to, "home_guide");

        let from_guide = index.outgoing("home_guide");
        assert_eq!(from_guide.len(), 1);
        assert_eq!(from_guide[0].action_set_id, "a2");
        assert_eq!(from_guide[0].to, "home");

        assert!(index.outgoing("done").is_empty());
    }

    #[test]
    fn test_action_set_lookup() {
        let index = build_index(&graph()).unwrap();
        let (edge, set) = index.action_set("e_guide", "a2").unwrap();
        assert_eq!(edge.id, "e_guide");
        assert_eq!(set.actions[0], Action::key("LEFT"));

        assert!(matches!(
            index.action_set("missing", "a1"),
            Err(NavError::UnknownEdge(_))
        ));
        assert!(matches!(
            index.action_set("e_guide", "zz"),
            Err(NavError::UnknownActionSet { .. })
        ));
    }

    #[test]
    fn test_transition_for_back_set() {
        let index = build_index(&graph()).unwrap();
        let t = index.transition("e_guide", "a2").unwrap();
        assert_eq!((t.from.as_str(), t.to.as_str()), ("home_guide", "home"));
    }

    #[test]
    fn test_invalid_graph_is_not_indexed() {
        let mut g = graph();
        g.nodes.retain(|n| n.kind != NodeKind::Start);
        match build_index(&g) {
            Err(NavError::Validation { tree_id, violations }) => {
                assert_eq!(tree_id, "tv");
                assert!(violations.iter().any(|v| v == "missing start node"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
