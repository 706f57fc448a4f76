use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavError {
    // Graph errors
    #[error("Graph {tree_id} failed validation with {} violation(s): {}", violations.len(), violations.join("; "))]
    Validation {
        tree_id: String,
        violations: Vec<String>,
    },

    #[error("Node not found: {0}")]
    UnknownNode(String),

    #[error("Edge not found: {0}")]
    UnknownEdge(String),

    #[error("Action set {action_set_id} not found on edge {edge_id}")]
    UnknownActionSet {
        edge_id: String,
        action_set_id: String,
    },

    #[error("Graph source error: {0}")]
    GraphSource(String),

    // Navigation errors
    #[error("No path from {from} to {to}")]
    PathNotFound { from: String, to: String },

    #[error("Step failed on edge {edge_id} (action set {action_set_id}, attempt {attempt}): {detail}")]
    StepFailed {
        edge_id: String,
        action_set_id: String,
        attempt: u32,
        detail: String,
    },

    #[error("Device error: {device_id}: {message}")]
    Device { device_id: String, message: String },

    // Session errors
    #[error("Device {device_id} is already locked by {owner}")]
    AlreadyLocked { device_id: String, owner: String },

    #[error("No session held on device {device_id}")]
    SessionNotFound { device_id: String },

    // Condition errors
    #[error("Operator '{operator}' is not supported for {kind} values")]
    UnsupportedOperator { kind: String, operator: String },

    #[error("Invalid operand for {kind} '{operator}': {message}")]
    InvalidOperand {
        kind: String,
        operator: String,
        message: String,
    },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NavError>;
