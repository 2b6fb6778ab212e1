//! # Entity Handles
//!
//! An [`EntityHandle`] is a borrowed view of one entity: tag, slot and a
//! reference to the manager. It never owns component data. Handles are
//! synthesized on lookup and cannot outlive a commit, because a commit
//! needs `&mut` access to the manager.
//!
//! To keep a reference across commits, take an [`EntityKey`] and resolve it
//! later; resolution fails once the entity has been removed.

use std::fmt;

use super::component::{Component, ComponentEntry, Kind};
use super::error::{StoreError, StoreResult};
use super::flyweight::Flyweight;
use super::manager::{EntityComponentManager, Requests};
use super::store::EntityRecord;
use super::tag::Tag;
use crate::memory::SlotHandle;

/// Detached, generation-checked reference to an entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityKey {
    tag: Tag,
    slot: SlotHandle,
}

impl EntityKey {
    /// The entity tag.
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// The slot at the time the key was taken.
    #[must_use]
    pub fn slot(&self) -> SlotHandle {
        self.slot
    }
}

/// Borrowed view of an entity.
#[derive(Clone)]
pub struct EntityHandle<'a> {
    tag: Tag,
    slot: Option<SlotHandle>,
    manager: &'a EntityComponentManager,
}

impl<'a> EntityHandle<'a> {
    pub(crate) fn bound(manager: &'a EntityComponentManager, tag: Tag, slot: SlotHandle) -> Self {
        Self {
            tag,
            slot: Some(slot),
            manager,
        }
    }

    pub(crate) fn empty(manager: &'a EntityComponentManager) -> Self {
        Self {
            tag: Tag::empty(),
            slot: None,
            manager,
        }
    }

    /// The entity tag. Empty for the empty handle.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Returns true for the handle produced by a lookup of a non-live tag.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// A detached key, or `None` for the empty handle.
    #[must_use]
    pub fn key(&self) -> Option<EntityKey> {
        self.slot.map(|slot| EntityKey {
            tag: self.tag.clone(),
            slot,
        })
    }

    fn record(&self) -> Option<&'a EntityRecord> {
        self.manager.store().record_at(self.slot?)
    }

    fn require(&self) -> StoreResult<&'a EntityRecord> {
        self.record()
            .ok_or_else(|| StoreError::UnknownEntity(self.tag.clone()))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The single component of kind `K`.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownEntity`] for the empty handle,
    /// [`StoreError::NotFound`] or [`StoreError::Ambiguous`] otherwise.
    pub fn get_component<K: Component>(&self) -> StoreResult<&'a K> {
        self.require()?.get::<K>()
    }

    /// Every component of kind `K`.
    #[must_use]
    pub fn get_components<K: Component>(&self) -> Vec<&'a K> {
        self.record()
            .map(|record| record.all::<K>().collect())
            .unwrap_or_default()
    }

    /// Every owned component.
    #[must_use]
    pub fn components(&self) -> &'a [ComponentEntry] {
        self.record().map(EntityRecord::components).unwrap_or(&[])
    }

    /// Owned components whose kind is listed.
    #[must_use]
    pub fn components_of_kinds(&self, kinds: &[Kind]) -> Vec<&'a ComponentEntry> {
        self.record()
            .map(|record| record.components_of_kinds(kinds))
            .unwrap_or_default()
    }

    /// Returns true if a component of kind `K` is attached.
    #[must_use]
    pub fn has<K: Component>(&self) -> bool {
        self.has_kinds(&[Kind::of::<K>()])
    }

    /// Returns true if every listed kind is attached.
    #[must_use]
    pub fn has_kinds(&self, kinds: &[Kind]) -> bool {
        self.record().is_some_and(|record| record.has_kinds(kinds))
    }

    /// The component if exactly one of kind `K` is attached.
    #[must_use]
    pub fn try_get<K: Component>(&self) -> Option<&'a K> {
        self.record()?.try_get::<K>()
    }

    /// Both components if each kind has exactly one match.
    #[must_use]
    pub fn try_get2<A: Component, B: Component>(&self) -> Option<(&'a A, &'a B)> {
        let record = self.record()?;
        Some((record.try_get::<A>()?, record.try_get::<B>()?))
    }

    /// Flyweights this entity references.
    #[must_use]
    pub fn flyweights(&self) -> &'a [Flyweight] {
        self.record().map(EntityRecord::flyweights).unwrap_or(&[])
    }

    /// Order of this entity for system `S`.
    #[must_use]
    pub fn get_order<S: 'static>(&self) -> i32 {
        self.manager.get_order::<S>(&self.tag)
    }

    // =========================================================================
    // Requests
    // =========================================================================

    fn requests(&self) -> &'a Requests {
        self.manager.requests_ref()
    }

    /// Requests attaching a component.
    pub fn add_component<T: Component>(&self, component: T) -> &Self {
        self.requests().add_component(&self.tag, component);
        self
    }

    /// Requests removal of a component by tag.
    pub fn remove_component(&self, component: &Tag) -> &Self {
        self.requests().remove_component(&self.tag, component);
        self
    }

    /// Requests removal of every component of kind `K`.
    pub fn remove_components_of_kind<K: Component>(&self) -> &Self {
        self.requests().remove_components_of_kind::<K>(&self.tag);
        self
    }

    /// Requests replacing the component of kind `K`.
    pub fn update_component<K: Component>(&self, value: K) -> &Self {
        self.requests().update_component(&self.tag, value);
        self
    }

    /// Requests joining a flyweight.
    pub fn add_flyweight(&self, flyweight: Flyweight) -> &Self {
        self.requests().add_flyweight(&self.tag, flyweight);
        self
    }

    /// Requests leaving a flyweight.
    pub fn remove_flyweight(&self, flyweight: &Flyweight) -> &Self {
        self.requests().remove_flyweight(&self.tag, flyweight);
        self
    }

    /// Requests removal of this entity.
    pub fn remove(&self) {
        self.requests().remove_entity(&self.tag);
    }
}

impl PartialEq for EntityHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
    }
}

impl Eq for EntityHandle<'_> {}

impl fmt::Debug for EntityHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityHandle")
            .field("tag", &self.tag)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Chains component requests onto a pending entity creation.
pub struct EntityBuilder<'a> {
    requests: &'a Requests,
    tag: Tag,
}

impl<'a> EntityBuilder<'a> {
    pub(crate) fn new(requests: &'a Requests, tag: Tag) -> Self {
        Self { requests, tag }
    }

    /// The tag of the entity being created.
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Requests attaching a component to the new entity.
    pub fn with<T: Component>(self, component: T) -> Self {
        self.requests.add_component(&self.tag, component);
        self
    }

    /// Requests attaching a wrapped component with a caller-chosen tag.
    pub fn with_entry(self, entry: ComponentEntry) -> Self {
        self.requests.add_entry(&self.tag, entry);
        self
    }

    /// Requests joining a flyweight.
    pub fn with_flyweight(self, flyweight: Flyweight) -> Self {
        self.requests.add_flyweight(&self.tag, flyweight);
        self
    }

    /// Ends the chain, returning the entity tag.
    #[must_use]
    pub fn finish(self) -> Tag {
        self.tag
    }
}

impl fmt::Debug for EntityBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityBuilder")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}
