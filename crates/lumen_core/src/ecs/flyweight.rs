//! # Flyweight Components
//!
//! Immutable component instances shared by many entities (materials,
//! shared geometry, shader sets). The registry stores each instance once
//! and tracks the set of entities referencing it.
//!
//! Disposal is reference counted: the instance is disposed when the last
//! member releases it. A release from an entity that is not a member
//! disposes the instance immediately; see [`Release::ForeignDisposed`].

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::component::Kind;
use super::tag::Tag;

/// Marker trait for shareable component payloads.
///
/// Flyweights are shared behind an [`Arc`], so disposal only gets `&self`;
/// the registry guarantees it is invoked at most once per instance.
pub trait FlyweightComponent: Any + Send + Sync {
    /// Called exactly once when the instance is disposed.
    fn dispose(&self) {}
}

trait ErasedFlyweight: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dispose_erased(&self);
}

impl<T: FlyweightComponent> ErasedFlyweight for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dispose_erased(&self) {
        FlyweightComponent::dispose(self);
    }
}

struct Shared {
    kind: Kind,
    disposed: AtomicBool,
    value: Box<dyn ErasedFlyweight>,
}

/// Shared handle to a flyweight instance.
///
/// Clones refer to the same instance and compare equal; identity is the tag.
#[derive(Clone)]
pub struct Flyweight {
    tag: Tag,
    shared: Arc<Shared>,
}

impl Flyweight {
    /// Wraps a payload under a freshly generated tag.
    #[must_use]
    pub fn new<T: FlyweightComponent>(value: T) -> Self {
        Self::with_tag(Tag::generate(), value)
    }

    /// Wraps a payload under an explicit tag.
    #[must_use]
    pub fn with_tag<T: FlyweightComponent>(tag: Tag, value: T) -> Self {
        Self {
            tag,
            shared: Arc::new(Shared {
                kind: Kind::of::<T>(),
                disposed: AtomicBool::new(false),
                value: Box::new(value),
            }),
        }
    }

    /// The instance tag.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// The payload kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.shared.kind
    }

    /// Returns true if the payload is of type `T`.
    #[inline]
    #[must_use]
    pub fn is<T: FlyweightComponent>(&self) -> bool {
        self.shared.kind.id() == TypeId::of::<T>()
    }

    /// Downcasts the payload.
    #[must_use]
    pub fn downcast_ref<T: FlyweightComponent>(&self) -> Option<&T> {
        self.shared.value.as_any().downcast_ref::<T>()
    }

    /// Returns true once the instance has been disposed.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    /// Disposes the payload. Returns true only for the call that disposed it.
    pub(crate) fn dispose(&self) -> bool {
        let first = !self.shared.disposed.swap(true, Ordering::AcqRel);
        if first {
            self.shared.value.dispose_erased();
        }
        first
    }
}

impl PartialEq for Flyweight {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
    }
}

impl Eq for Flyweight {}

impl fmt::Debug for Flyweight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flyweight")
            .field("tag", &self.tag)
            .field("kind", &self.shared.kind)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Outcome of releasing a flyweight from an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The entity left the membership set; other members remain.
    Retained {
        /// Members still referencing the instance.
        remaining: usize,
    },
    /// The last member left; the instance was disposed and unregistered.
    Disposed,
    /// The entity was not a member. The instance was disposed immediately
    /// regardless of the remaining members.
    ///
    /// This is a safety valve for double releases, not a normal path. It is
    /// unclear whether upstream callers rely on it, so it is kept as-is and
    /// logged rather than turned into an error.
    ForeignDisposed,
}

struct FlyweightEntry {
    instance: Flyweight,
    members: HashSet<Tag>,
}

/// Registry of flyweight instances and their referencing entities.
#[derive(Default)]
pub struct FlyweightRegistry {
    entries: HashMap<Tag, FlyweightEntry>,
}

impl FlyweightRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `entity` to the membership of `instance`, registering it on
    /// first use.
    ///
    /// Returns true if the entity was not already a member.
    pub fn add(&mut self, entity: Tag, instance: Flyweight) -> bool {
        self.entries
            .entry(instance.tag().clone())
            .or_insert_with(|| FlyweightEntry {
                instance,
                members: HashSet::new(),
            })
            .members
            .insert(entity)
    }

    /// Removes `entity` from the membership of `instance`.
    pub fn remove(&mut self, entity: &Tag, instance: &Flyweight) -> Release {
        let Some(entry) = self.entries.get_mut(instance.tag()) else {
            instance.dispose();
            return Release::ForeignDisposed;
        };

        if !entry.members.remove(entity) {
            entry.instance.dispose();
            return Release::ForeignDisposed;
        }

        if entry.members.is_empty() {
            if let Some(entry) = self.entries.remove(instance.tag()) {
                entry.instance.dispose();
            }
            return Release::Disposed;
        }

        Release::Retained {
            remaining: entry.members.len(),
        }
    }

    /// Returns the registered instance for a tag.
    #[must_use]
    pub fn get(&self, tag: &Tag) -> Option<&Flyweight> {
        self.entries.get(tag).map(|e| &e.instance)
    }

    /// Returns the entities referencing a registered instance.
    #[must_use]
    pub fn members(&self, tag: &Tag) -> Option<&HashSet<Tag>> {
        self.entries.get(tag).map(|e| &e.members)
    }

    /// Returns true if `entity` references the instance.
    #[must_use]
    pub fn is_member(&self, tag: &Tag, entity: &Tag) -> bool {
        self.entries
            .get(tag)
            .is_some_and(|e| e.members.contains(entity))
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no instance is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over registered instances.
    pub fn iter(&self) -> impl Iterator<Item = &Flyweight> {
        self.entries.values().map(|e| &e.instance)
    }

    /// Disposes every registered instance and clears the registry.
    pub fn dispose_all(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.instance.dispose();
        }
    }
}

impl fmt::Debug for FlyweightRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlyweightRegistry")
            .field("instances", &self.entries.len())
            .finish()
    }
}
