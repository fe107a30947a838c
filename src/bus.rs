//! Process-local publish/subscribe for change notification
//!
//! Topics carry no payload — a publish means "something about this topic
//! changed, go re-read it". Listeners are invoked synchronously in
//! subscription order. The bus is not durable: a restart loses all
//! subscriptions and consumers re-subscribe on reconnect.
//!
//! The bus is an explicitly constructed value owned by the top-level
//! server and handed to whoever needs it; cloning shares the same
//! underlying registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::store::{PlayerId, RoomCode};

/// The key grouping interested listeners
///
/// Player topics change when the player's name or game changes; room
/// topics change when anything visible on the owner dashboard does.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// All listeners watching a room (the owner dashboard)
    Room(RoomCode),
    /// All listeners watching one player's sessions
    Player(PlayerId),
}

/// A callback fired on publish; must not call back into the bus
type Listener = Box<dyn Fn() + Send + Sync>;

/// Handle identifying one subscription for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Inner {
    next_id: u64,
    topics: HashMap<Topic, Vec<(u64, Listener)>>,
}

/// Process-wide topic registry
///
/// Cheap to clone; all clones share the same subscriptions.
#[derive(Clone, Default)]
pub struct TopicEventBus {
    inner: Arc<Mutex<Inner>>,
}

impl TopicEventBus {
    /// Creates an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for a topic
    ///
    /// Returns the handle needed to unsubscribe later.
    pub fn subscribe(&self, topic: Topic, listener: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let mut inner = self.inner.lock().expect("bus lock poisoned");
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .topics
            .entry(topic)
            .or_default()
            .push((id, Box::new(listener)));
        SubscriptionId(id)
    }

    /// Removes a previously registered listener
    ///
    /// Removing the last listener of a topic frees its entry. Unknown
    /// handles are ignored.
    pub fn unsubscribe(&self, topic: &Topic, subscription: SubscriptionId) {
        let mut inner = self.inner.lock().expect("bus lock poisoned");
        if let Some(listeners) = inner.topics.get_mut(topic) {
            listeners.retain(|(id, _)| *id != subscription.0);
            if listeners.is_empty() {
                inner.topics.remove(topic);
            }
        }
    }

    /// Invokes every listener of a topic, in subscription order
    ///
    /// A publish on a topic with no subscribers is a no-op.
    pub fn publish(&self, topic: &Topic) {
        let inner = self.inner.lock().expect("bus lock poisoned");
        if let Some(listeners) = inner.topics.get(topic) {
            for (_, listener) in listeners {
                listener();
            }
        }
    }

    /// Number of live listeners on a topic
    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.inner
            .lock()
            .expect("bus lock poisoned")
            .topics
            .get(topic)
            .map_or(0, Vec::len)
    }
}
