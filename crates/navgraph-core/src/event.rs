use crate::types::NavEvent;

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<NavEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: NavEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<NavEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(NavEvent::SessionAcquired {
            device_id: "stb-1".into(),
            tree_id: "tv".into(),
            owner: "runner".into(),
        });
    }

    #[test]
    fn subscriber_receives_event() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.publish(NavEvent::SessionAcquired {
            device_id: "stb-1".into(),
            tree_id: "tv".into(),
            owner: "runner".into(),
        });
        match rx.try_recv().unwrap() {
            NavEvent::SessionAcquired { device_id, .. } => assert_eq!(device_id, "stb-1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
