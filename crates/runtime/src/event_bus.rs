use std::collections::{BTreeSet, VecDeque};

use foundation::geo::{LngLat, ScreenPoint};

/// Renderer lifecycle events the dashboard core reacts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapEvent {
    /// The base style finished loading; sources and layers may be added.
    StyleLoaded,
    /// A user pick at a canvas position.
    Click { point: ScreenPoint, lng_lat: LngLat },
    /// The renderer finished all pending paint work.
    Idle,
}

impl MapEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MapEvent::StyleLoaded => EventKind::StyleLoaded,
            MapEvent::Click { .. } => EventKind::Click,
            MapEvent::Idle => EventKind::Idle,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    StyleLoaded,
    Click,
    Idle,
}

/// FIFO of renderer events, filtered by a subscription set.
///
/// Subscriptions are established once at initialization. Events of a kind
/// nobody subscribed to are dropped at publish time, so the queue only ever
/// holds work the core will act on.
#[derive(Debug, Default)]
pub struct EventBus {
    subscriptions: BTreeSet<EventKind>,
    queue: VecDeque<MapEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: EventKind) -> bool {
        self.subscriptions.insert(kind)
    }

    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.subscriptions.contains(&kind)
    }

    /// Queues `event` if its kind is subscribed. Returns `true` if queued.
    pub fn publish(&mut self, event: MapEvent) -> bool {
        if !self.is_subscribed(event.kind()) {
            return false;
        }
        self.queue.push_back(event);
        true
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn pop(&mut self) -> Option<MapEvent> {
        self.queue.pop_front()
    }

    /// Drops queued events and all subscriptions.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.subscriptions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{EventBus, EventKind, MapEvent};
    use foundation::geo::{LngLat, ScreenPoint};

    #[test]
    fn unsubscribed_events_are_dropped() {
        let mut bus = EventBus::new();
        assert!(!bus.publish(MapEvent::Idle));
        assert_eq!(bus.pending(), 0);

        bus.subscribe(EventKind::Idle);
        assert!(bus.publish(MapEvent::Idle));
        assert_eq!(bus.pending(), 1);
    }

    #[test]
    fn pop_preserves_publish_order() {
        let mut bus = EventBus::new();
        bus.subscribe(EventKind::Click);
        bus.subscribe(EventKind::Idle);

        let click = MapEvent::Click {
            point: ScreenPoint::new(1.0, 2.0),
            lng_lat: LngLat::new(121.5, 25.0),
        };
        bus.publish(MapEvent::Idle);
        bus.publish(click);

        assert_eq!(bus.pop(), Some(MapEvent::Idle));
        assert_eq!(bus.pop(), Some(click));
        assert!(bus.pop().is_none());
    }
}
