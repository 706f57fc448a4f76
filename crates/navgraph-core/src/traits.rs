use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::graph::{Action, Graph, Verification};
use crate::types::DriverResponse;

/// Performs taps, key presses and swipes on a physical device.
///
/// Must tolerate repeated calls with identical parameters; retries rely on it.
pub trait DeviceDriver: Send + Sync + 'static {
    /// Run a single action. `Err` means the driver itself broke, and is
    /// treated like a failed action.
    fn run<'a>(&'a self, action: &'a Action) -> BoxFuture<'a, Result<DriverResponse>>;
}

/// Decides whether a device is showing the expected node.
pub trait Verifier: Send + Sync + 'static {
    fn verify<'a>(&'a self, verification: &'a Verification)
        -> BoxFuture<'a, Result<DriverResponse>>;
}

/// Loads navigation trees from persistence.
pub trait GraphSource: Send + Sync + 'static {
    fn load<'a>(&'a self, tree_id: &'a str) -> BoxFuture<'a, Result<Graph>>;
}

/// The collaborators needed to drive one device.
#[derive(Clone)]
pub struct DeviceHandle {
    pub driver: Arc<dyn DeviceDriver>,
    pub verifier: Arc<dyn Verifier>,
}

impl DeviceHandle {
    pub fn new(driver: Arc<dyn DeviceDriver>, verifier: Arc<dyn Verifier>) -> Self {
        Self { driver, verifier }
    }
}
