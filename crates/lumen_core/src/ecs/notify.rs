//! # Change Notification
//!
//! Observer hook invoked synchronously for every committed add or remove,
//! so external indices (spatial trees, picking caches) stay current.
//!
//! Sinks run inside a commit. They must not block on the store; they may
//! enqueue new requests through a cloned [`Requests`](super::Requests)
//! handle, which are applied on the next cycle.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::component::ComponentEntry;
use super::flyweight::Flyweight;
use super::tag::Tag;

/// A committed structural change.
#[derive(Debug, Clone, Copy)]
pub enum Change<'a> {
    /// An entity became live or was removed.
    Entity(&'a Tag),
    /// An owned component was attached or detached. The entry's
    /// [`entity`](ComponentEntry::entity) is the owner.
    Component(&'a ComponentEntry),
    /// An entity joined or left a flyweight membership.
    Flyweight {
        /// The entity.
        entity: &'a Tag,
        /// The shared instance.
        flyweight: &'a Flyweight,
    },
}

/// Sink for committed changes.
pub trait ChangeNotify: Send + Sync {
    /// Called after an add was committed.
    fn notify_add(&self, change: &Change<'_>);

    /// Called after a remove was committed, before the removed component is
    /// disposed.
    fn notify_remove(&self, change: &Change<'_>);
}

/// Sink that ignores every change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotify;

impl ChangeNotify for NullNotify {
    fn notify_add(&self, _change: &Change<'_>) {}

    fn notify_remove(&self, _change: &Change<'_>) {}
}

/// Broadcasts every change to the subscribed sinks, in subscription order.
#[derive(Default)]
pub struct Notificator {
    sinks: RwLock<Vec<Arc<dyn ChangeNotify>>>,
}

impl Notificator {
    /// Creates a notificator with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    pub fn subscribe(&self, sink: Arc<dyn ChangeNotify>) {
        self.sinks.write().push(sink);
    }

    /// Number of subscribed sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    /// Returns true if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }
}

impl ChangeNotify for Notificator {
    fn notify_add(&self, change: &Change<'_>) {
        for sink in self.sinks.read().iter() {
            sink.notify_add(change);
        }
    }

    fn notify_remove(&self, change: &Change<'_>) {
        for sink in self.sinks.read().iter() {
            sink.notify_remove(change);
        }
    }
}

impl fmt::Debug for Notificator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notificator")
            .field("sinks", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
    }

    impl ChangeNotify for Recorder {
        fn notify_add(&self, change: &Change<'_>) {
            if let Change::Entity(tag) = change {
                self.log.lock().push(format!("+{tag}"));
            }
        }

        fn notify_remove(&self, change: &Change<'_>) {
            if let Change::Entity(tag) = change {
                self.log.lock().push(format!("-{tag}"));
            }
        }
    }

    #[test]
    fn test_fan_out_reaches_every_sink() {
        let notificator = Notificator::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        notificator.subscribe(a.clone());
        notificator.subscribe(b.clone());
        assert_eq!(notificator.len(), 2);

        let tag = Tag::named("A");
        notificator.notify_add(&Change::Entity(&tag));
        notificator.notify_remove(&Change::Entity(&tag));

        assert_eq!(*a.log.lock(), vec!["+A", "-A"]);
        assert_eq!(*b.log.lock(), vec!["+A", "-A"]);
    }
}
