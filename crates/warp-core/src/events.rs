//! Marker edit notifications
//!
//! Events let external components (undo history, persistence, editor
//! panels) observe committed edits without participating in validation.
//! They fire only after a commit, never before or during, so a subscriber
//! that re-reads the map on receipt always sees the post-edit state.

use crate::types::{MarkerId, MarkerKind};

/// Events broadcast to subscribers after each committed edit
#[derive(Debug, Clone)]
pub enum MarkerEvent {
    /// A marker was added
    Added {
        id: MarkerId,
        kind: MarkerKind,
        original_pos: i64,
    },

    /// A marker's warped position changed
    Moved {
        id: MarkerId,
        /// Effective (possibly clamped) warped position in samples
        warped_pos: i64,
        /// The same position expressed in beats
        beat: f64,
    },

    /// A marker was removed
    Deleted { id: MarkerId },

    /// All non-anchor markers were removed
    Cleared { removed: usize },

    /// The whole marker set was replaced
    Replaced { count: usize },
}

/// Capacity of the default event channel
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Event bus for broadcasting marker events to subscribers
pub struct EventBus {
    sender: crossbeam::channel::Sender<MarkerEvent>,
    receiver: crossbeam::channel::Receiver<MarkerEvent>,
}

impl EventBus {
    /// Create a new event bus with bounded capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam::channel::bounded(capacity);
        Self { sender, receiver }
    }

    /// Get a sender for publishing events
    pub fn sender(&self) -> crossbeam::channel::Sender<MarkerEvent> {
        self.sender.clone()
    }

    /// Get a receiver for subscribing to events
    pub fn subscribe(&self) -> crossbeam::channel::Receiver<MarkerEvent> {
        self.receiver.clone()
    }

    /// Publish an event without blocking the editing thread
    ///
    /// Events are observability, not state: if the channel is full or
    /// disconnected the event is dropped with a warning rather than
    /// stalling an edit on observer backpressure.
    pub fn publish(&self, event: MarkerEvent) {
        if let Err(e) = self.sender.try_send(event) {
            log::warn!("dropping marker event: {}", e);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_roundtrip() {
        let bus = EventBus::new(16);
        let rx = bus.subscribe();

        bus.publish(MarkerEvent::Deleted { id: MarkerId(9) });

        let event = rx.recv().unwrap();
        match event {
            MarkerEvent::Deleted { id } => assert_eq!(id, MarkerId(9)),
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_full_bus_drops_instead_of_blocking() {
        let bus = EventBus::new(2);
        let _rx = bus.subscribe();

        // Third publish exceeds capacity; it must return without blocking.
        bus.publish(MarkerEvent::Cleared { removed: 1 });
        bus.publish(MarkerEvent::Cleared { removed: 2 });
        bus.publish(MarkerEvent::Cleared { removed: 3 });
    }
}
