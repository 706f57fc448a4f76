//! Navigation engine for device UIs modelled as directed graphs.
//!
//! Screens and focus positions are nodes; transitions are edges carrying
//! direction-tagged action sets. The engine validates and indexes a graph,
//! finds the shortest route between two nodes, walks it on a device with
//! bounded retries and arrival verification, and keeps one exclusive session
//! per device so the index is built once and reused.

pub mod condition;
pub mod executor;
pub mod graph;
pub mod navigator;
pub mod pathfinder;
pub mod session;
pub mod source;

pub use condition::{evaluate, supported_operators, ConditionValue, EvalResult, Operator, ValueKind};
pub use executor::{ExecutionPolicy, Executor};
pub use graph::{build_index, validate, NavIndex, ValidationReport, Violation, ViolationCode};
pub use navigator::Navigator;
pub use pathfinder::{find_path, PathStep};
pub use session::{SessionInfo, SessionManager, SessionTicket};
pub use source::JsonFileGraphSource;
