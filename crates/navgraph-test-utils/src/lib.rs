//! Mocks and fixtures shared by navgraph tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;

use navgraph_core::error::{NavError, Result};
use navgraph_core::graph::{Action, ActionSet, Edge, Graph, Node, NodeKind, Verification};
use navgraph_core::traits::{DeviceDriver, GraphSource, Verifier};
use navgraph_core::types::DriverResponse;

/// How a scripted command misbehaves.
#[derive(Debug, Clone, Copy)]
enum FailureRule {
    Always,
    Times(usize),
    DriverError,
}

/// Device driver that records every action and fails on request.
///
/// Commands are matched on `Action::describe()`, e.g. `press_key(OK)`.
#[derive(Default)]
pub struct ScriptedDriver {
    calls: Mutex<Vec<String>>,
    rules: Mutex<HashMap<String, FailureRule>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every run of `command` reports failure.
    pub fn fail_always(self, command: &str) -> Self {
        self.rules
            .lock()
            .unwrap()
            .insert(command.to_string(), FailureRule::Always);
        self
    }

    /// The first `times` runs of `command` report failure.
    pub fn fail_times(self, command: &str, times: usize) -> Self {
        self.rules
            .lock()
            .unwrap()
            .insert(command.to_string(), FailureRule::Times(times));
        self
    }

    /// Every run of `command` returns a driver error.
    pub fn error_on(self, command: &str) -> Self {
        self.rules
            .lock()
            .unwrap()
            .insert(command.to_string(), FailureRule::DriverError);
        self
    }

    /// Commands run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// How many times `command` ran.
    pub fn count(&self, command: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == command).count()
    }
}

impl DeviceDriver for ScriptedDriver {
    fn run<'a>(&'a self, action: &'a Action) -> BoxFuture<'a, Result<DriverResponse>> {
        Box::pin(async move {
            let command = action.describe();
            self.calls.lock().unwrap().push(command.clone());

            let mut rules = self.rules.lock().unwrap();
            match rules.get_mut(&command) {
                Some(FailureRule::Always) => Ok(DriverResponse::failed(format!("{command} rejected"))),
                Some(FailureRule::Times(n)) if *n > 0 => {
                    *n -= 1;
                    Ok(DriverResponse::failed(format!("{command} rejected")))
                }
                Some(FailureRule::DriverError) => Err(NavError::Device {
                    device_id: "scripted".into(),
                    message: format!("transport lost during {command}"),
                }),
                _ => Ok(DriverResponse::ok(format!("{command} done"))),
            }
        })
    }
}

/// Verifier that passes everything except the commands told to fail.
#[derive(Default)]
pub struct ScriptedVerifier {
    failing: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, command: &str) -> Self {
        self.failing.lock().unwrap().push(command.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Verifier for ScriptedVerifier {
    fn verify<'a>(&'a self, verification: &'a Verification) -> BoxFuture<'a, Result<DriverResponse>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(verification.command.clone());
            if self.failing.lock().unwrap().contains(&verification.command) {
                Ok(DriverResponse::failed(format!("{} not matched", verification.command)))
            } else {
                Ok(DriverResponse::ok("matched"))
            }
        })
    }
}

/// In-memory graph source that counts loads.
#[derive(Default)]
pub struct StaticGraphSource {
    graphs: HashMap<String, Graph>,
    loads: AtomicUsize,
}

impl StaticGraphSource {
    pub fn new(graphs: Vec<Graph>) -> Self {
        Self {
            graphs: graphs.into_iter().map(|g| (g.tree_id.clone(), g)).collect(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl GraphSource for StaticGraphSource {
    fn load<'a>(&'a self, tree_id: &'a str) -> BoxFuture<'a, Result<Graph>> {
        Box::pin(async move {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.graphs
                .get(tree_id)
                .cloned()
                .ok_or_else(|| NavError::GraphSource(format!("unknown tree '{tree_id}'")))
        })
    }
}

/// A set-top-box style tree:
///
/// ```text
/// entry --HOME--> home <-RIGHT/LEFT-> home_guide <-OK/BACK-> guide --(no-op)--> done
/// ```
///
/// `guide` carries a `guide_banner` verification.
pub fn tv_graph() -> Graph {
    Graph::new("tv")
        .with_node(Node::new("entry", NodeKind::Start).with_label("Power on"))
        .with_node(Node::new("home", NodeKind::Focus).with_label("Home"))
        .with_node(Node::new("home_guide", NodeKind::Focus).with_label("Home: Guide tile"))
        .with_node(
            Node::new("guide", NodeKind::Screen)
                .with_label("TV Guide")
                .with_verification(
                    Verification::new("guide_banner").with_param("text", serde_json::json!("TV Guide")),
                ),
        )
        .with_node(Node::new("done", NodeKind::Success))
        .with_edge(
            Edge::new("e_entry_home", "entry", "home")
                .with_action_set(ActionSet::forward("go_home").with_actions(vec![Action::key("HOME")])),
        )
        .with_edge(
            Edge::new("e_home_guide", "home", "home_guide")
                .with_action_set(ActionSet::forward("a1").with_actions(vec![Action::key("RIGHT")]))
                .with_action_set(ActionSet::back("a2").with_actions(vec![Action::key("LEFT")])),
        )
        .with_edge(
            Edge::new("e_guide", "home_guide", "guide")
                .with_action_set(ActionSet::forward("open").with_actions(vec![Action::key("OK")]))
                .with_action_set(ActionSet::back("close").with_actions(vec![Action::key("BACK")])),
        )
        .with_edge(Edge::new("e_done", "guide", "done").with_action_set(ActionSet::forward("finish")))
}

/// A graph with no start node and a dangling edge.
pub fn broken_graph() -> Graph {
    Graph::new("broken")
        .with_node(Node::new("home", NodeKind::Focus))
        .with_node(Node::new("done", NodeKind::Success))
        .with_edge(Edge::new("e1", "home", "missing").with_action_set(ActionSet::forward("go")))
}
