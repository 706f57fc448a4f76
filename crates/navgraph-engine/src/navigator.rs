use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use navgraph_core::config::AppConfig;
use navgraph_core::error::Result;
use navgraph_core::event::EventBus;
use navgraph_core::traits::{DeviceHandle, GraphSource};
use navgraph_core::types::{ExecutionTrace, StepOutcome};

use crate::condition::{supported_operators, OperatorInfo, ValueKind};
use crate::executor::{ExecutionPolicy, Executor};
use crate::graph::{build_index, validate, ValidationReport};
use crate::pathfinder::{find_path, PathStep};
use crate::session::{SessionManager, SessionTicket};

/// Caller-facing entry point: validates graphs, hands out device sessions and
/// walks them to target nodes.
pub struct Navigator {
    source: Arc<dyn GraphSource>,
    sessions: SessionManager,
    executor: Executor,
    events: Arc<EventBus>,
}

impl Navigator {
    pub fn new(source: Arc<dyn GraphSource>, policy: ExecutionPolicy) -> Self {
        let events = Arc::new(EventBus::default());
        Self {
            source,
            sessions: SessionManager::new().with_events(events.clone()),
            executor: Executor::new(policy).with_events(events.clone()),
            events,
        }
    }

    pub fn from_config(source: Arc<dyn GraphSource>, config: &AppConfig) -> Self {
        Self::new(source, ExecutionPolicy::from(&config.execution))
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Load a tree and report every invariant it breaks.
    pub async fn validate_graph(&self, tree_id: &str) -> Result<ValidationReport> {
        let graph = self.source.load(tree_id).await?;
        let report = validate(&graph);
        debug!(tree_id, violations = report.violations.len(), "Validated graph");
        Ok(report)
    }

    /// Lock `device_id` for `owner`, building and caching the tree's index on
    /// first acquisition.
    ///
    /// Re-acquiring your own session refreshes it without reloading the tree.
    /// The new `device` handle replaces the old one; the cached index and the
    /// tracked position are kept.
    pub async fn acquire_session(
        &self,
        device_id: &str,
        tree_id: &str,
        owner: &str,
        device: DeviceHandle,
    ) -> Result<SessionTicket> {
        if let Some(ticket) = self.sessions.refresh_if_owned(device_id, tree_id, owner, &device)? {
            debug!(device_id, tree_id, owner, "Session refreshed");
            return Ok(ticket);
        }

        // Loading and indexing happen outside the session table lock;
        // `acquire` re-checks ownership before installing.
        let graph = self.source.load(tree_id).await?;
        let index = Arc::new(build_index(&graph)?);
        self.sessions.acquire(device_id, owner, index, device)
    }

    pub fn release_session(&self, ticket: &SessionTicket) -> Result<bool> {
        self.sessions.release(&ticket.device_id, &ticket.owner)
    }

    /// Admin override: drop whatever lock `device_id` holds.
    pub fn force_release(&self, device_id: &str) -> Option<String> {
        self.sessions.force_release(device_id)
    }

    /// Reclaim sessions idle longer than `idle_timeout`. Meant to be called
    /// periodically by the host process.
    pub fn sweep(&self, idle_timeout: Duration) -> usize {
        self.sessions.sweep(idle_timeout)
    }

    /// Tell the session where the device actually is.
    pub fn set_position(&self, ticket: &SessionTicket, node_id: &str) -> Result<()> {
        self.sessions.set_position(ticket, node_id)
    }

    /// Compute, without executing, the route from the session's position.
    pub fn plan(&self, ticket: &SessionTicket, target: &str) -> Result<Vec<PathStep>> {
        let lease = self.sessions.lease(ticket)?;
        find_path(&lease.index, &lease.position, target)
    }

    /// Walk the device from its last confirmed node to `target`.
    ///
    /// A failed step ends the walk; the session position is left at the last
    /// confirmed node so the caller can re-plan from there.
    pub async fn navigate(&self, ticket: &SessionTicket, target: &str) -> Result<ExecutionTrace> {
        let lease = self.sessions.lease(ticket)?;

        if lease.position == target {
            debug!(device_id = %ticket.device_id, target, "Already at target");
            return Ok(ExecutionTrace {
                started_at: Utc::now(),
                origin: lease.position.clone(),
                destination: target.to_string(),
                steps: vec![],
                final_node: lease.position,
                succeeded: true,
                total_elapsed_ms: 0,
            });
        }

        let path = find_path(&lease.index, &lease.position, target)?;
        info!(
            device_id = %ticket.device_id,
            from = %lease.position,
            to = target,
            steps = path.len(),
            "Navigating"
        );

        let trace = self
            .executor
            .execute_path(
                &lease.index,
                &path,
                lease.device.driver.as_ref(),
                lease.device.verifier.as_ref(),
            )
            .await?;

        self.record_position(ticket, &lease.position, &trace.final_node);
        Ok(trace)
    }

    /// Run one action set of one edge and confirm arrival at its target.
    pub async fn execute_edge(
        &self,
        ticket: &SessionTicket,
        edge_id: &str,
        action_set_id: &str,
    ) -> Result<StepOutcome> {
        let lease = self.sessions.lease(ticket)?;
        let step = self
            .executor
            .execute_step(
                &lease.index,
                edge_id,
                action_set_id,
                lease.device.driver.as_ref(),
                lease.device.verifier.as_ref(),
            )
            .await?;

        if step.from != lease.position {
            debug!(
                device_id = %ticket.device_id,
                position = %lease.position,
                edge_from = %step.from,
                "Edge executed away from the tracked position"
            );
        }
        if step.succeeded() {
            self.record_position(ticket, &lease.position, &step.to);
        }
        Ok(step)
    }

    /// Operators available for a value kind.
    pub fn list_supported_operators(kind: ValueKind) -> &'static [OperatorInfo] {
        supported_operators(kind)
    }

    fn record_position(&self, ticket: &SessionTicket, previous: &str, current: &str) {
        if previous == current {
            return;
        }
        if let Err(e) = self.sessions.set_position(ticket, current) {
            // The session was released or taken over mid-walk.
            warn!(device_id = %ticket.device_id, error = %e, "Could not record position");
        }
    }
}
