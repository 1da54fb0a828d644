//! Event bus for engine notifications
//!
//! Key principles:
//! - Events are queued when sent and delivered on `dispatch`
//! - Handlers return bool (true = consumed, stops forwarding)
//! - Registration returns an id so subscribers can detach independently of
//!   the emitter's lifetime

use crate::scene::SceneObjectId;

/// Animation lifecycle notifications published by animation players
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationEvent {
    /// What happened
    pub kind: AnimationEventKind,
    /// Entity scene object owning the animation player
    pub entity: SceneObjectId,
    /// Name of the clip
    pub clip: String,
}

/// Kind of animation notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationEventKind {
    /// Clip started playing
    Begin,
    /// Clip wrapped around while looping
    Loop,
    /// Non-looping clip reached its end
    End,
}

/// Subscription identifier returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Event handler trait
/// Returns true if event was consumed (stops forwarding)
/// Returns false to allow forwarding to other handlers
pub trait EventHandler<E> {
    /// Handle an event, return true if consumed
    fn on_event(&mut self, event: &E) -> bool;
}

impl<E, F> EventHandler<E> for F
where
    F: FnMut(&E) -> bool,
{
    fn on_event(&mut self, event: &E) -> bool {
        self(event)
    }
}

/// Small publish/subscribe bus with queued delivery
pub struct EventBus<E> {
    queue: Vec<E>,
    handlers: Vec<(SubscriptionId, Box<dyn EventHandler<E>>)>,
    next_id: u64,
}

impl<E> EventBus<E> {
    /// Create a new empty event bus
    pub fn new() -> Self {
        Self {
            queue: Vec::new(),
            handlers: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a handler; handlers are called in registration order
    pub fn subscribe(&mut self, handler: impl EventHandler<E> + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns false if the id was unknown
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    /// Queue an event for the next dispatch
    pub fn send(&mut self, event: E) {
        self.queue.push(event);
    }

    /// Number of queued events
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Deliver all queued events, returns how many were delivered
    pub fn dispatch(&mut self) -> usize {
        let events = std::mem::take(&mut self.queue);
        for event in &events {
            for (_, handler) in self.handlers.iter_mut() {
                if handler.on_event(event) {
                    break;
                }
            }
        }
        events.len()
    }

    /// Remove and return queued events without delivering them
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.queue)
    }

    /// Clear all queued events
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_queued_dispatch() {
        let mut bus = EventBus::<u32>::new();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        bus.subscribe(move |event: &u32| {
            sink.borrow_mut().push(*event);
            false
        });

        bus.send(1);
        bus.send(2);
        assert!(received.borrow().is_empty());
        assert_eq!(bus.pending(), 2);

        assert_eq!(bus.dispatch(), 2);
        assert_eq!(*received.borrow(), vec![1, 2]);
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn test_consumed_event_stops_forwarding() {
        let mut bus = EventBus::<u32>::new();
        let second_calls = Rc::new(RefCell::new(0));
        let counter = second_calls.clone();
        bus.subscribe(|_: &u32| true);
        bus.subscribe(move |_: &u32| {
            *counter.borrow_mut() += 1;
            false
        });

        bus.send(7);
        bus.dispatch();
        assert_eq!(*second_calls.borrow(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = EventBus::<u32>::new();
        let id = bus.subscribe(|_: &u32| false);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
    }
}
