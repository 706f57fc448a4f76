use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use navgraph_core::config::ExecutionConfig;
use navgraph_core::error::Result;
use navgraph_core::event::EventBus;
use navgraph_core::graph::{Action, ActionSet};
use navgraph_core::traits::{DeviceDriver, Verifier};
use navgraph_core::types::{
    ActionPhase, ActionRecord, ActionSetOutcome, ExecutionTrace, NavEvent, StepOutcome,
    StepStatus, VerificationRecord,
};

use crate::graph::NavIndex;
use crate::pathfinder::PathStep;

/// Retry and pacing policy applied to every action set.
#[derive(Debug, Clone)]
pub struct ExecutionPolicy {
    /// Re-attempts of a failing forward list, unless the set overrides it.
    pub retry_budget: u32,
    /// Wait after actions that declare no delay of their own.
    pub action_delay: Duration,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self::from(&ExecutionConfig::default())
    }
}

impl From<&ExecutionConfig> for ExecutionPolicy {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            retry_budget: config.retry_budget,
            action_delay: Duration::from_millis(config.action_delay_ms),
        }
    }
}

/// Runs action sets and path walks against a device.
///
/// Each action set goes through attempt, bounded retry, failure cleanup and
/// arrival verification. A path walk stops at the first failed step; it never
/// re-plans on its own.
pub struct Executor {
    policy: ExecutionPolicy,
    events: Option<Arc<EventBus>>,
}

impl Executor {
    pub fn new(policy: ExecutionPolicy) -> Self {
        Self {
            policy,
            events: None,
        }
    }

    /// Publish step events on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn policy(&self) -> &ExecutionPolicy {
        &self.policy
    }

    /// Run one action set: the forward list, re-attempted up to the retry
    /// budget, then failure actions if it never succeeded.
    ///
    /// An empty forward list succeeds immediately.
    pub async fn execute_action_set(
        &self,
        set: &ActionSet,
        driver: &dyn DeviceDriver,
    ) -> ActionSetOutcome {
        let start = Instant::now();
        let budget = set.retry_budget.unwrap_or(self.policy.retry_budget);
        let mut records = Vec::new();
        let mut attempts = 0u32;
        let mut last_failure = None;

        loop {
            attempts += 1;

            if attempts > 1 && !set.retry_actions.is_empty() {
                if let Err(detail) = self
                    .run_list(&set.retry_actions, ActionPhase::Retry, attempts, driver, &mut records, true)
                    .await
                {
                    warn!(action_set_id = %set.id, attempt = attempts, detail = %detail, "Retry actions failed");
                }
            }

            match self
                .run_list(&set.actions, ActionPhase::Forward, attempts, driver, &mut records, true)
                .await
            {
                Ok(()) => {
                    return ActionSetOutcome {
                        action_set_id: set.id.clone(),
                        status: StepStatus::Passed,
                        attempts,
                        retries_used: attempts - 1,
                        actions: records,
                        failure_detail: None,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    };
                }
                Err(detail) => {
                    if attempts <= budget {
                        warn!(
                            action_set_id = %set.id,
                            attempt = attempts,
                            retry_budget = budget,
                            detail = %detail,
                            "Action set attempt failed, retrying"
                        );
                        last_failure = Some(detail);
                        continue;
                    }
                    last_failure = Some(detail);
                    break;
                }
            }
        }

        warn!(
            action_set_id = %set.id,
            attempts,
            "Retries exhausted, running failure actions"
        );
        if let Err(detail) = self
            .run_list(&set.failure_actions, ActionPhase::Failure, attempts, driver, &mut records, false)
            .await
        {
            warn!(action_set_id = %set.id, detail = %detail, "Failure actions reported an error");
        }

        ActionSetOutcome {
            action_set_id: set.id.clone(),
            status: StepStatus::Failed,
            attempts,
            retries_used: attempts - 1,
            actions: records,
            failure_detail: last_failure,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Traverse one edge via one action set, confirming arrival with the
    /// target node's verifications.
    pub async fn execute_step(
        &self,
        index: &NavIndex,
        edge_id: &str,
        action_set_id: &str,
        driver: &dyn DeviceDriver,
        verifier: &dyn Verifier,
    ) -> Result<StepOutcome> {
        let (edge, set) = index.action_set(edge_id, action_set_id)?;
        let (from, to) = edge.endpoints(set.direction);

        info!(edge_id, action_set_id, from, to, "Executing step");
        self.publish(NavEvent::StepStarted {
            edge_id: edge_id.to_string(),
            action_set_id: action_set_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });

        let start = Instant::now();
        let outcome = self.execute_action_set(set, driver).await;
        let mut verifications = Vec::new();
        let mut status = outcome.status;
        let mut failure_detail = outcome.failure_detail.clone();

        if outcome.succeeded() {
            let checks = index.node(to).map(|n| n.verifications.as_slice()).unwrap_or(&[]);
            for check in checks {
                let check_start = Instant::now();
                let (success, detail) = match verifier.verify(check).await {
                    Ok(resp) => (resp.success, resp.detail),
                    Err(e) => (false, e.to_string()),
                };
                verifications.push(VerificationRecord {
                    command: check.command.clone(),
                    success,
                    detail: detail.clone(),
                    elapsed_ms: check_start.elapsed().as_millis() as u64,
                });
                if !success {
                    warn!(edge_id, node_id = to, verification = %check.command, detail = %detail, "Arrival verification failed");
                    status = StepStatus::Failed;
                    failure_detail = Some(format!(
                        "verification '{}' on node '{}' failed: {}",
                        check.command, to, detail
                    ));
                    break;
                }
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(edge_id, action_set_id, ?status, attempts = outcome.attempts, elapsed_ms, "Step complete");
        self.publish(NavEvent::StepFinished {
            edge_id: edge_id.to_string(),
            action_set_id: action_set_id.to_string(),
            status,
            attempts: outcome.attempts,
            elapsed_ms,
        });

        Ok(StepOutcome {
            edge_id: edge_id.to_string(),
            action_set_id: action_set_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            status,
            attempts: outcome.attempts,
            retries_used: outcome.retries_used,
            actions: outcome.actions,
            verifications,
            failure_detail,
            elapsed_ms,
        })
    }

    /// Walk a path in order, stopping at the first failed step.
    ///
    /// The trace holds every executed step; `final_node` is the last node whose
    /// arrival was confirmed. An empty path yields an empty, successful trace.
    pub async fn execute_path(
        &self,
        index: &NavIndex,
        path: &[PathStep],
        driver: &dyn DeviceDriver,
        verifier: &dyn Verifier,
    ) -> Result<ExecutionTrace> {
        let started_at = Utc::now();
        let start = Instant::now();
        let origin = path.first().map(|s| s.from.clone()).unwrap_or_default();
        let destination = path.last().map(|s| s.to.clone()).unwrap_or_default();
        let mut final_node = origin.clone();
        let mut steps = Vec::with_capacity(path.len());
        let mut succeeded = true;

        for step in path {
            let outcome = self
                .execute_step(index, &step.edge_id, &step.action_set_id, driver, verifier)
                .await?;
            let passed = outcome.succeeded();
            if passed {
                final_node = outcome.to.clone();
            }
            steps.push(outcome);
            if !passed {
                warn!(
                    edge_id = %step.edge_id,
                    action_set_id = %step.action_set_id,
                    last_confirmed = %final_node,
                    "Step failed, stopping walk"
                );
                succeeded = false;
                break;
            }
        }

        let total_elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            origin = %origin,
            destination = %destination,
            steps = steps.len(),
            succeeded,
            total_elapsed_ms,
            "Path walk complete"
        );

        Ok(ExecutionTrace {
            started_at,
            origin,
            destination,
            steps,
            final_node,
            succeeded,
            total_elapsed_ms,
        })
    }

    /// Run a list of actions in order. With `stop_on_failure`, the first
    /// failing action ends the list; otherwise every action runs and the first
    /// failure is reported.
    async fn run_list(
        &self,
        actions: &[Action],
        phase: ActionPhase,
        attempt: u32,
        driver: &dyn DeviceDriver,
        records: &mut Vec<ActionRecord>,
        stop_on_failure: bool,
    ) -> std::result::Result<(), String> {
        let mut first_failure = None;

        for action in actions {
            let start = Instant::now();
            let (success, detail) = match driver.run(action).await {
                Ok(resp) => (resp.success, resp.detail),
                Err(e) => (false, e.to_string()),
            };
            let elapsed_ms = start.elapsed().as_millis() as u64;
            debug!(command = %action.describe(), ?phase, attempt, success, elapsed_ms, "Action ran");

            records.push(ActionRecord {
                phase,
                attempt,
                command: action.describe(),
                success,
                detail: detail.clone(),
                elapsed_ms,
            });

            if !success {
                let failure = format!("{} failed: {}", action.describe(), detail);
                if stop_on_failure {
                    return Err(failure);
                }
                first_failure.get_or_insert(failure);
            }

            let delay = action
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or(self.policy.action_delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    fn publish(&self, event: NavEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ExecutionPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_index;
    use crate::pathfinder::find_path;
    use navgraph_core::graph::Action;
    use navgraph_test_utils::{tv_graph, ScriptedDriver, ScriptedVerifier};

    fn executor(retry_budget: u32) -> Executor {
        Executor::new(ExecutionPolicy {
            retry_budget,
            action_delay: Duration::ZERO,
        })
    }

    fn flaky_set() -> ActionSet {
        ActionSet::forward("s")
            .with_actions(vec![Action::key("UP"), Action::key("OK")])
            .with_retry_actions(vec![Action::key("EXIT")])
            .with_failure_actions(vec![Action::key("HOME"), Action::key("HOME")])
    }

    #[tokio::test]
    async fn always_failing_set_uses_whole_budget() {
        let driver = ScriptedDriver::new().fail_always("press_key(OK)");
        let outcome = executor(3).execute_action_set(&flaky_set(), &driver).await;

        assert_eq!(outcome.status, StepStatus::Failed);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.retries_used, 3);
        assert_eq!(driver.count("press_key(UP)"), 4);
        assert_eq!(driver.count("press_key(OK)"), 4);
        assert_eq!(driver.count("press_key(EXIT)"), 3);
        // Failure actions run exactly once (the list has two HOME presses).
        assert_eq!(driver.count("press_key(HOME)"), 2);
        assert_eq!(
            outcome.actions.iter().filter(|a| a.phase == ActionPhase::Failure).count(),
            2
        );
        assert!(outcome.failure_detail.unwrap().contains("press_key(OK)"));
    }

    #[tokio::test]
    async fn first_failing_action_aborts_the_list() {
        let driver = ScriptedDriver::new().fail_always("press_key(UP)");
        let outcome = executor(0).execute_action_set(&flaky_set(), &driver).await;

        assert_eq!(outcome.attempts, 1);
        assert_eq!(driver.count("press_key(OK)"), 0);
        assert_eq!(driver.count("press_key(EXIT)"), 0);
    }

    #[tokio::test]
    async fn retry_recovers_after_transient_failure() {
        let driver = ScriptedDriver::new().fail_times("press_key(OK)", 1);
        let outcome = executor(2).execute_action_set(&flaky_set(), &driver).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.retries_used, 1);
        assert_eq!(driver.count("press_key(HOME)"), 0);
        assert_eq!(
            driver.calls(),
            vec![
                "press_key(UP)",
                "press_key(OK)",
                "press_key(EXIT)",
                "press_key(UP)",
                "press_key(OK)",
            ]
        );
    }

    #[tokio::test]
    async fn set_budget_overrides_policy() {
        let driver = ScriptedDriver::new().fail_always("press_key(OK)");
        let set = flaky_set().with_retry_budget(0);
        let outcome = executor(5).execute_action_set(&set, &driver).await;
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn driver_error_counts_as_failed_action() {
        let driver = ScriptedDriver::new().error_on("press_key(OK)");
        let outcome = executor(1).execute_action_set(&flaky_set(), &driver).await;
        assert_eq!(outcome.status, StepStatus::Failed);
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.failure_detail.unwrap().contains("transport lost"));
    }

    #[tokio::test]
    async fn failing_failure_actions_do_not_change_outcome() {
        let driver = ScriptedDriver::new()
            .fail_always("press_key(OK)")
            .fail_always("press_key(HOME)");
        let outcome = executor(0).execute_action_set(&flaky_set(), &driver).await;
        assert_eq!(outcome.status, StepStatus::Failed);
        // Cleanup is best effort: both HOME presses still run.
        assert_eq!(driver.count("press_key(HOME)"), 2);
    }

    #[tokio::test]
    async fn empty_forward_list_is_a_noop_success() {
        let driver = ScriptedDriver::new();
        let outcome = executor(2)
            .execute_action_set(&ActionSet::forward("noop"), &driver)
            .await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts, 1);
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn verification_failure_fails_the_step() {
        let index = build_index(&tv_graph()).unwrap();
        let driver = ScriptedDriver::new();
        let verifier = ScriptedVerifier::new().fail("guide_banner");

        let step = executor(2)
            .execute_step(&index, "e_guide", "open", &driver, &verifier)
            .await
            .unwrap();

        assert_eq!(step.status, StepStatus::Failed);
        assert!(step.verification_failed());
        assert_eq!(step.attempts, 1);
        assert_eq!(driver.calls(), vec!["press_key(OK)"]);
        assert!(step.failure_detail.unwrap().contains("guide_banner"));
    }

    #[tokio::test]
    async fn verifications_skipped_when_actions_fail() {
        let index = build_index(&tv_graph()).unwrap();
        let driver = ScriptedDriver::new().fail_always("press_key(OK)");
        let verifier = ScriptedVerifier::new();

        let step = executor(0)
            .execute_step(&index, "e_guide", "open", &driver, &verifier)
            .await
            .unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert!(verifier.calls().is_empty());
    }

    #[tokio::test]
    async fn walk_stops_at_first_failed_step() {
        let index = build_index(&tv_graph()).unwrap();
        let path = find_path(&index, "entry", "guide").unwrap();
        assert_eq!(path.len(), 3);

        let driver = ScriptedDriver::new().fail_always("press_key(RIGHT)");
        let verifier = ScriptedVerifier::new();
        let trace = executor(1)
            .execute_path(&index, &path, &driver, &verifier)
            .await
            .unwrap();

        assert!(!trace.succeeded);
        assert_eq!(trace.steps.len(), 2);
        assert_eq!(trace.final_node, "home");
        assert_eq!(trace.failed_step().unwrap().edge_id, "e_home_guide");
        assert_eq!(driver.count("press_key(OK)"), 0);
        assert!(trace.into_result().is_err());
    }

    #[tokio::test]
    async fn walk_publishes_step_events() {
        let index = build_index(&tv_graph()).unwrap();
        let path = find_path(&index, "home", "home_guide").unwrap();
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();

        let trace = executor(0)
            .with_events(bus.clone())
            .execute_path(&index, &path, &ScriptedDriver::new(), &ScriptedVerifier::new())
            .await
            .unwrap();
        assert!(trace.succeeded);
        assert_eq!(trace.final_node, "home_guide");

        assert!(matches!(rx.try_recv().unwrap(), NavEvent::StepStarted { .. }));
        match rx.try_recv().unwrap() {
            NavEvent::StepFinished { status, attempts, .. } => {
                assert_eq!(status, StepStatus::Passed);
                assert_eq!(attempts, 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
