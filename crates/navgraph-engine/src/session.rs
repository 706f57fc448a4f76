use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use navgraph_core::error::{NavError, Result};
use navgraph_core::event::EventBus;
use navgraph_core::traits::DeviceHandle;
use navgraph_core::types::{NavEvent, ReleaseReason};

use crate::graph::NavIndex;

/// Proof of a held session, passed back on every navigation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub device_id: String,
    pub tree_id: String,
    pub owner: String,
}

/// What a navigation call needs from its session. Cloned out of the table so
/// no lock is held while the device is driven.
#[derive(Clone)]
pub struct SessionLease {
    pub index: Arc<NavIndex>,
    pub device: DeviceHandle,
    /// Last confirmed node.
    pub position: String,
}

/// Snapshot of one held session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub device_id: String,
    pub tree_id: String,
    pub owner: String,
    pub acquired_at: DateTime<Utc>,
    pub last_refresh: DateTime<Utc>,
    pub position: String,
}

struct SessionEntry {
    tree_id: String,
    owner: String,
    acquired_at: DateTime<Utc>,
    last_refresh: DateTime<Utc>,
    index: Arc<NavIndex>,
    device: DeviceHandle,
    position: String,
}

impl SessionEntry {
    fn ticket(&self, device_id: &str) -> SessionTicket {
        SessionTicket {
            device_id: device_id.to_string(),
            tree_id: self.tree_id.clone(),
            owner: self.owner.clone(),
        }
    }
}

/// Exclusive per-device locks, each holding the cached graph index for the
/// tree it was acquired with.
///
/// Every table mutation happens under one mutex held only for the
/// check-and-set; pathfinding and execution run outside it.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    events: Option<Arc<EventBus>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            events: None,
        }
    }

    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// If `owner` already holds `device_id` for `tree_id`, refresh it, swap in
    /// `device` and return its ticket. `Ok(None)` means the caller must build
    /// an index and call `acquire`.
    pub fn refresh_if_owned(
        &self,
        device_id: &str,
        tree_id: &str,
        owner: &str,
        device: &DeviceHandle,
    ) -> Result<Option<SessionTicket>> {
        let mut sessions = self.table();
        match sessions.get_mut(device_id) {
            Some(entry) if entry.owner != owner => Err(NavError::AlreadyLocked {
                device_id: device_id.to_string(),
                owner: entry.owner.clone(),
            }),
            Some(entry) if entry.tree_id == tree_id => {
                entry.last_refresh = Utc::now();
                entry.device = device.clone();
                Ok(Some(entry.ticket(device_id)))
            }
            _ => Ok(None),
        }
    }

    /// Lock `device_id` for `owner` with a prebuilt index.
    ///
    /// Re-acquiring a session already held by the same owner for the same tree
    /// refreshes it and replaces the device handle; the cached index and
    /// position are kept. A lock held by anyone else is reported as
    /// `AlreadyLocked` and left untouched.
    pub fn acquire(
        &self,
        device_id: &str,
        owner: &str,
        index: Arc<NavIndex>,
        device: DeviceHandle,
    ) -> Result<SessionTicket> {
        let tree_id = index.tree_id().to_string();
        let now = Utc::now();
        let mut sessions = self.table();

        if let Some(entry) = sessions.get_mut(device_id) {
            if entry.owner != owner {
                warn!(device_id, owner, held_by = %entry.owner, "Session already locked");
                return Err(NavError::AlreadyLocked {
                    device_id: device_id.to_string(),
                    owner: entry.owner.clone(),
                });
            }
            if entry.tree_id == tree_id {
                entry.last_refresh = now;
                entry.device = device;
                return Ok(entry.ticket(device_id));
            }
            info!(device_id, owner, from_tree = %entry.tree_id, to_tree = %tree_id, "Switching session tree");
        }

        let entry = SessionEntry {
            tree_id: tree_id.clone(),
            owner: owner.to_string(),
            acquired_at: now,
            last_refresh: now,
            position: index.start_node().to_string(),
            index,
            device,
        };
        let ticket = entry.ticket(device_id);
        sessions.insert(device_id.to_string(), entry);
        drop(sessions);

        info!(device_id, tree_id = %tree_id, owner, "Session acquired");
        self.publish(NavEvent::SessionAcquired {
            device_id: device_id.to_string(),
            tree_id,
            owner: owner.to_string(),
        });
        Ok(ticket)
    }

    /// Release `owner`'s lock on `device_id`.
    ///
    /// Returns `false` when the device was not locked. A lock held by another
    /// owner is not released.
    pub fn release(&self, device_id: &str, owner: &str) -> Result<bool> {
        let mut sessions = self.table();
        let holder = match sessions.get(device_id) {
            Some(entry) => entry.owner.clone(),
            None => return Ok(false),
        };
        if holder != owner {
            return Err(NavError::AlreadyLocked {
                device_id: device_id.to_string(),
                owner: holder,
            });
        }
        sessions.remove(device_id);
        drop(sessions);

        info!(device_id, owner, "Session released");
        self.publish(NavEvent::SessionReleased {
            device_id: device_id.to_string(),
            owner: owner.to_string(),
            reason: ReleaseReason::Released,
        });
        Ok(true)
    }

    /// Unconditionally drop the lock on `device_id`, returning its owner.
    pub fn force_release(&self, device_id: &str) -> Option<String> {
        let removed = self.table().remove(device_id)?;
        warn!(device_id, owner = %removed.owner, "Session force-released");
        self.publish(NavEvent::SessionReleased {
            device_id: device_id.to_string(),
            owner: removed.owner.clone(),
            reason: ReleaseReason::Forced,
        });
        Some(removed.owner)
    }

    /// Release every session idle for longer than `idle_timeout`.
    /// Returns how many were reclaimed.
    pub fn sweep(&self, idle_timeout: Duration) -> usize {
        self.sweep_at(Utc::now(), idle_timeout)
    }

    /// `sweep` against an explicit clock reading.
    pub fn sweep_at(&self, now: DateTime<Utc>, idle_timeout: Duration) -> usize {
        // A timeout too large for chrono never expires anything.
        let Ok(timeout) = chrono::Duration::from_std(idle_timeout) else {
            return 0;
        };

        let mut sessions = self.table();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, e)| now.signed_duration_since(e.last_refresh) > timeout)
            .map(|(device_id, _)| device_id.clone())
            .collect();
        let reclaimed: Vec<(String, String)> = expired
            .into_iter()
            .filter_map(|device_id| sessions.remove(&device_id).map(|e| (device_id, e.owner)))
            .collect();
        drop(sessions);

        for (device_id, owner) in &reclaimed {
            info!(device_id = %device_id, owner = %owner, "Idle session reclaimed");
            self.publish(NavEvent::SessionReleased {
                device_id: device_id.clone(),
                owner: owner.clone(),
                reason: ReleaseReason::Idle,
            });
        }
        reclaimed.len()
    }

    /// Check the ticket still holds its session, refresh it, and hand out
    /// what a navigation call needs.
    pub fn lease(&self, ticket: &SessionTicket) -> Result<SessionLease> {
        let mut sessions = self.table();
        let entry = owned_entry(&mut sessions, ticket)?;
        entry.last_refresh = Utc::now();
        Ok(SessionLease {
            index: entry.index.clone(),
            device: entry.device.clone(),
            position: entry.position.clone(),
        })
    }

    /// Record the last confirmed node of a session.
    pub fn set_position(&self, ticket: &SessionTicket, node_id: &str) -> Result<()> {
        let mut sessions = self.table();
        let entry = owned_entry(&mut sessions, ticket)?;
        if entry.index.node(node_id).is_none() {
            return Err(NavError::UnknownNode(node_id.to_string()));
        }
        entry.position = node_id.to_string();
        Ok(())
    }

    /// The cached index of the session on `device_id`, if any.
    pub fn index(&self, device_id: &str) -> Option<Arc<NavIndex>> {
        self.table().get(device_id).map(|e| e.index.clone())
    }

    /// Owner of the lock on `device_id`, if locked.
    pub fn holder(&self, device_id: &str) -> Option<String> {
        self.table().get(device_id).map(|e| e.owner.clone())
    }

    pub fn is_locked(&self, device_id: &str) -> bool {
        self.table().contains_key(device_id)
    }

    /// Snapshot of all held sessions, sorted by device id.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut list: Vec<SessionInfo> = self
            .table()
            .iter()
            .map(|(device_id, e)| SessionInfo {
                device_id: device_id.clone(),
                tree_id: e.tree_id.clone(),
                owner: e.owner.clone(),
                acquired_at: e.acquired_at,
                last_refresh: e.last_refresh,
                position: e.position.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        list
    }

    fn publish(&self, event: NavEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn owned_entry<'a>(
    sessions: &'a mut HashMap<String, SessionEntry>,
    ticket: &SessionTicket,
) -> Result<&'a mut SessionEntry> {
    let entry = sessions
        .get_mut(&ticket.device_id)
        .ok_or_else(|| NavError::SessionNotFound {
            device_id: ticket.device_id.clone(),
        })?;
    if entry.owner != ticket.owner {
        return Err(NavError::AlreadyLocked {
            device_id: ticket.device_id.clone(),
            owner: entry.owner.clone(),
        });
    }
    if entry.tree_id != ticket.tree_id {
        return Err(NavError::SessionNotFound {
            device_id: ticket.device_id.clone(),
        });
    }
    Ok(entry)
}
