use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NavError;

/// Reply from a device driver or verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverResponse {
    pub success: bool,
    #[serde(default)]
    pub detail: String,
}

impl DriverResponse {
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }
}

/// Which action list an action was run from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    Forward,
    Retry,
    Failure,
}

/// One action as it ran against the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub phase: ActionPhase,
    /// Forward attempt this action belongs to (1-based).
    pub attempt: u32,
    pub command: String,
    pub success: bool,
    pub detail: String,
    pub elapsed_ms: u64,
}

/// One verification as it ran on arrival.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub command: String,
    pub success: bool,
    pub detail: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
}

/// Outcome of running one action set against a device, before verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSetOutcome {
    pub action_set_id: String,
    pub status: StepStatus,
    /// Total runs of the forward list, including the first.
    pub attempts: u32,
    /// Re-attempts consumed from the retry budget.
    pub retries_used: u32,
    pub actions: Vec<ActionRecord>,
    /// Detail of the last failing forward action, when the set failed.
    pub failure_detail: Option<String>,
    pub elapsed_ms: u64,
}

impl ActionSetOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Passed
    }
}

/// Outcome of one traversed edge, including arrival verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub edge_id: String,
    pub action_set_id: String,
    pub from: String,
    pub to: String,
    pub status: StepStatus,
    pub attempts: u32,
    pub retries_used: u32,
    pub actions: Vec<ActionRecord>,
    pub verifications: Vec<VerificationRecord>,
    /// Why the step failed, if it did.
    pub failure_detail: Option<String>,
    pub elapsed_ms: u64,
}

impl StepOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Passed
    }

    /// Whether the action list passed but arrival could not be confirmed.
    pub fn verification_failed(&self) -> bool {
        self.verifications.iter().any(|v| !v.success)
    }

    /// Convert a failed step into a `StepFailed` error.
    pub fn to_error(&self) -> Option<NavError> {
        if self.succeeded() {
            return None;
        }
        Some(NavError::StepFailed {
            edge_id: self.edge_id.clone(),
            action_set_id: self.action_set_id.clone(),
            attempt: self.attempts,
            detail: self
                .failure_detail
                .clone()
                .unwrap_or_else(|| "unknown failure".to_string()),
        })
    }
}

/// Ordered record of a path walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub started_at: DateTime<Utc>,
    /// Node the walk started from.
    pub origin: String,
    /// Node the walk was heading to.
    pub destination: String,
    pub steps: Vec<StepOutcome>,
    /// Last node whose arrival was confirmed.
    pub final_node: String,
    pub succeeded: bool,
    pub total_elapsed_ms: u64,
}

impl ExecutionTrace {
    /// The step that stopped the walk, if any.
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| !s.succeeded())
    }

    /// Turn a failed walk into a `StepFailed` error.
    pub fn into_result(self) -> crate::error::Result<Self> {
        match self.failed_step().and_then(StepOutcome::to_error) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Events emitted while sessions are managed and paths are walked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavEvent {
    SessionAcquired {
        device_id: String,
        tree_id: String,
        owner: String,
    },
    SessionReleased {
        device_id: String,
        owner: String,
        reason: ReleaseReason,
    },
    StepStarted {
        edge_id: String,
        action_set_id: String,
        from: String,
        to: String,
    },
    StepFinished {
        edge_id: String,
        action_set_id: String,
        status: StepStatus,
        attempts: u32,
        elapsed_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    Released,
    Forced,
    Idle,
}
