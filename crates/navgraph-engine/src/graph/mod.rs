//! Graph validation and indexing.
//!
//! `validate` checks the structural invariants of a navigation graph and
//! reports every violation at once. `build_index` validates and then builds
//! the adjacency structure the pathfinder and executor work from; that index
//! is what a session caches.

pub mod index;
pub mod validator;

pub use index::{build_index, NavIndex, Transition};
pub use validator::{validate, ValidationReport, Violation, ViolationCode};
