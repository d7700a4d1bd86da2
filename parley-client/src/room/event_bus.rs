use crate::room::{EventType, RoomEvent};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type EventHandler = Arc<dyn Fn(&RoomEvent) + Send + Sync>;

/// Ticket returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Typed publish/subscribe keyed by [`EventType`].
///
/// Handlers run synchronously on the emitting task, in subscription order.
/// Emission works on a snapshot, so a handler may subscribe or unsubscribe
/// without deadlocking the bus.
#[derive(Default)]
pub struct EventBus {
    handlers: DashMap<EventType, Vec<(SubscriptionId, EventHandler)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, event: EventType, handler: F) -> SubscriptionId
    where
        F: Fn(&RoomEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .entry(event)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for mut entry in self.handlers.iter_mut() {
            let before = entry.len();
            entry.retain(|(sub, _)| *sub != id);
            removed |= entry.len() != before;
        }
        removed
    }

    pub fn emit(&self, event: &RoomEvent) {
        let snapshot: Vec<EventHandler> = match self.handlers.get(&event.event_type()) {
            Some(list) => list.iter().map(|(_, h)| h.clone()).collect(),
            None => return,
        };
        for handler in snapshot {
            handler(event);
        }
    }

    pub fn subscriber_count(&self, event: EventType) -> usize {
        self.handlers.get(&event).map_or(0, |list| list.len())
    }
}
