//! # Component Store
//!
//! The committed state: live entities, their owned components, a per-entity
//! kind index, flyweight memberships and the order index.
//!
//! ## Layout
//!
//! ```text
//! live: Tag ──> SlotHandle ──> records[slot]
//!                                 ├─ components  (bucket, insertion order)
//!                                 ├─ kinds       (Kind -> count)
//!                                 └─ flyweights  (instances referenced)
//! ```
//!
//! Only commit-time commands mutate the store. Every mutation entry point
//! here is `pub(crate)` and reached through a synchronization context.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::component::{Component, ComponentEntry, Kind};
use super::error::{StoreError, StoreResult};
use super::flyweight::{Flyweight, FlyweightRegistry, Release};
use super::notify::{Change, ChangeNotify};
use super::order::OrderIndex;
use super::tag::Tag;
use crate::memory::{SlotHandle, SlotPool};

/// Committed data of one live entity.
pub struct EntityRecord {
    tag: Tag,
    components: Vec<ComponentEntry>,
    kinds: HashMap<Kind, usize>,
    flyweights: Vec<Flyweight>,
    flyweight_kinds: HashMap<Kind, usize>,
}

impl EntityRecord {
    fn new(tag: Tag) -> Self {
        Self {
            tag,
            components: Vec::new(),
            kinds: HashMap::new(),
            flyweights: Vec::new(),
            flyweight_kinds: HashMap::new(),
        }
    }

    /// The entity tag.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Owned components in insertion order.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[ComponentEntry] {
        &self.components
    }

    /// Flyweights this entity is a member of.
    #[inline]
    #[must_use]
    pub fn flyweights(&self) -> &[Flyweight] {
        &self.flyweights
    }

    /// Returns the single component of kind `K`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] for zero matches, [`StoreError::Ambiguous`]
    /// for more than one.
    pub fn get<K: Component>(&self) -> StoreResult<&K> {
        let mut matches = self.all::<K>();
        let Some(first) = matches.next() else {
            return Err(StoreError::NotFound {
                entity: self.tag.clone(),
                kind: Kind::of::<K>().name(),
            });
        };
        if matches.next().is_some() {
            return Err(StoreError::Ambiguous {
                entity: self.tag.clone(),
                kind: Kind::of::<K>().name(),
                count: self.kind_count(Kind::of::<K>()),
            });
        }
        Ok(first)
    }

    /// Iterates over every component of kind `K`.
    pub fn all<K: Component>(&self) -> impl Iterator<Item = &K> {
        self.components.iter().filter_map(ComponentEntry::downcast_ref::<K>)
    }

    /// Returns the component only if exactly one of kind `K` exists.
    #[must_use]
    pub fn try_get<K: Component>(&self) -> Option<&K> {
        if self.kind_count(Kind::of::<K>()) == 1 {
            self.all::<K>().next()
        } else {
            None
        }
    }

    /// Number of owned components of a kind.
    #[inline]
    #[must_use]
    pub fn kind_count(&self, kind: Kind) -> usize {
        self.kinds.get(&kind).copied().unwrap_or(0)
    }

    /// Number of owned components and flyweight memberships of a kind.
    #[inline]
    #[must_use]
    pub fn capability_count(&self, kind: Kind) -> usize {
        self.kind_count(kind) + self.flyweight_kinds.get(&kind).copied().unwrap_or(0)
    }

    /// Returns true if every listed kind is present, as an owned component
    /// or a flyweight.
    #[must_use]
    pub fn has_kinds(&self, kinds: &[Kind]) -> bool {
        kinds.iter().all(|kind| self.capability_count(*kind) > 0)
    }

    /// Components whose kind is in `kinds`, in insertion order.
    #[must_use]
    pub fn components_of_kinds(&self, kinds: &[Kind]) -> Vec<&ComponentEntry> {
        self.components
            .iter()
            .filter(|entry| kinds.contains(&entry.kind()))
            .collect()
    }

    fn contains_component(&self, component: &Tag) -> bool {
        self.components.iter().any(|entry| entry.tag() == component)
    }

    fn push(&mut self, entry: ComponentEntry) {
        *self.kinds.entry(entry.kind()).or_insert(0) += 1;
        self.components.push(entry);
    }

    fn push_flyweight(&mut self, flyweight: Flyweight) {
        *self.flyweight_kinds.entry(flyweight.kind()).or_insert(0) += 1;
        self.flyweights.push(flyweight);
    }

    fn take_flyweight(&mut self, flyweight: &Flyweight) -> bool {
        let Some(index) = self.flyweights.iter().position(|f| f.tag() == flyweight.tag()) else {
            return false;
        };
        let removed = self.flyweights.remove(index);
        if let Some(count) = self.flyweight_kinds.get_mut(&removed.kind()) {
            *count -= 1;
            if *count == 0 {
                self.flyweight_kinds.remove(&removed.kind());
            }
        }
        true
    }

    fn take(&mut self, index: usize) -> ComponentEntry {
        let entry = self.components.remove(index);
        if let Some(count) = self.kinds.get_mut(&entry.kind()) {
            *count -= 1;
            if *count == 0 {
                self.kinds.remove(&entry.kind());
            }
        }
        entry
    }
}

impl fmt::Debug for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRecord")
            .field("tag", &self.tag)
            .field("components", &self.components.len())
            .field("flyweights", &self.flyweights.len())
            .finish()
    }
}

/// Committed entity and component state.
pub struct Store {
    live: HashMap<Tag, SlotHandle>,
    records: SlotPool<EntityRecord>,
    flyweights: FlyweightRegistry,
    order: OrderIndex,
    notify: Arc<dyn ChangeNotify>,
}

impl Store {
    pub(crate) fn new(notify: Arc<dyn ChangeNotify>) -> Self {
        Self {
            live: HashMap::new(),
            records: SlotPool::new(),
            flyweights: FlyweightRegistry::new(),
            order: OrderIndex::new(),
            notify,
        }
    }

    // =========================================================================
    // Reads (committed state only)
    // =========================================================================

    /// Returns true if the entity is live.
    #[inline]
    #[must_use]
    pub fn is_live(&self, entity: &Tag) -> bool {
        self.live.contains_key(entity)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.live.len()
    }

    /// The slot of a live entity.
    #[inline]
    #[must_use]
    pub fn slot_of(&self, entity: &Tag) -> Option<SlotHandle> {
        self.live.get(entity).copied()
    }

    /// The record of a live entity.
    #[must_use]
    pub fn record(&self, entity: &Tag) -> Option<&EntityRecord> {
        self.records.get(*self.live.get(entity)?)
    }

    /// The record at a slot, if the slot still holds the same generation.
    #[inline]
    #[must_use]
    pub fn record_at(&self, slot: SlotHandle) -> Option<&EntityRecord> {
        self.records.get(slot)
    }

    /// Live records in slot order.
    pub fn records(&self) -> impl Iterator<Item = (SlotHandle, &EntityRecord)> {
        self.records.iter()
    }

    fn require(&self, entity: &Tag) -> StoreResult<&EntityRecord> {
        self.record(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.clone()))
    }

    /// Returns the single component of kind `K` on `entity`.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownEntity`] if the entity is not live,
    /// [`StoreError::NotFound`] or [`StoreError::Ambiguous`] if there is not
    /// exactly one match.
    pub fn get_component<K: Component>(&self, entity: &Tag) -> StoreResult<&K> {
        self.require(entity)?.get::<K>()
    }

    /// Every component of kind `K` on `entity`. Unknown entities yield an
    /// empty list.
    #[must_use]
    pub fn get_components<K: Component>(&self, entity: &Tag) -> Vec<&K> {
        self.record(entity)
            .map(|record| record.all::<K>().collect())
            .unwrap_or_default()
    }

    /// Every owned component of `entity`. Unknown entities yield an empty
    /// slice.
    #[must_use]
    pub fn components(&self, entity: &Tag) -> &[ComponentEntry] {
        self.record(entity).map(EntityRecord::components).unwrap_or(&[])
    }

    /// Owned components of `entity` whose kind is listed.
    #[must_use]
    pub fn components_of_kinds(&self, entity: &Tag, kinds: &[Kind]) -> Vec<&ComponentEntry> {
        self.record(entity)
            .map(|record| record.components_of_kinds(kinds))
            .unwrap_or_default()
    }

    /// Returns true if `entity` has at least one component of kind `K`.
    #[must_use]
    pub fn has<K: Component>(&self, entity: &Tag) -> bool {
        self.has_kinds(entity, &[Kind::of::<K>()])
    }

    /// Returns true if `entity` has every listed kind.
    #[must_use]
    pub fn has_kinds(&self, entity: &Tag, kinds: &[Kind]) -> bool {
        self.record(entity).is_some_and(|record| record.has_kinds(kinds))
    }

    /// Returns the component if exactly one of kind `K` exists on a live
    /// entity.
    #[must_use]
    pub fn try_get<K: Component>(&self, entity: &Tag) -> Option<&K> {
        self.record(entity)?.try_get::<K>()
    }

    /// Returns both components if each kind has exactly one match.
    #[must_use]
    pub fn try_get2<A: Component, B: Component>(&self, entity: &Tag) -> Option<(&A, &B)> {
        let record = self.record(entity)?;
        Some((record.try_get::<A>()?, record.try_get::<B>()?))
    }

    /// Every component of kind `K` across all live entities.
    #[must_use]
    pub fn all_components_of<K: Component>(&self) -> Vec<(&Tag, &K)> {
        self.records
            .iter()
            .flat_map(|(_, record)| record.all::<K>().map(move |c| (&record.tag, c)))
            .collect()
    }

    /// Flyweights referenced by `entity`.
    #[must_use]
    pub fn flyweights_of(&self, entity: &Tag) -> &[Flyweight] {
        self.record(entity).map(EntityRecord::flyweights).unwrap_or(&[])
    }

    /// The flyweight registry.
    #[inline]
    #[must_use]
    pub fn flyweights(&self) -> &FlyweightRegistry {
        &self.flyweights
    }

    /// The order index.
    #[inline]
    #[must_use]
    pub fn order(&self) -> &OrderIndex {
        &self.order
    }

    pub(crate) fn order_mut(&mut self) -> &mut OrderIndex {
        &mut self.order
    }

    // =========================================================================
    // Commit-time mutation
    // =========================================================================

    pub(crate) fn create_entity(&mut self, tag: Tag) {
        if tag.is_empty() {
            tracing::warn!("ignoring creation of the empty tag");
            return;
        }
        if self.live.contains_key(&tag) {
            tracing::warn!(entity = %tag, "entity already live, creation skipped");
            return;
        }

        let slot = self.records.allocate(EntityRecord::new(tag.clone()));
        self.live.insert(tag.clone(), slot);
        tracing::trace!(entity = %tag, "entity created");
        self.notify.notify_add(&Change::Entity(&tag));
    }

    pub(crate) fn remove_entity(&mut self, tag: &Tag) {
        let Some(slot) = self.live.remove(tag) else {
            tracing::warn!(entity = %tag, "removal of unknown entity skipped");
            return;
        };
        let Some(record) = self.records.free(slot) else {
            return;
        };

        tracing::trace!(entity = %tag, "entity removed");
        self.notify.notify_remove(&Change::Entity(tag));

        for mut entry in record.components {
            self.notify.notify_remove(&Change::Component(&entry));
            entry.dispose();
        }
        for flyweight in &record.flyweights {
            self.release_flyweight(tag, flyweight);
        }
    }

    pub(crate) fn add_component(&mut self, entity: &Tag, mut entry: ComponentEntry) {
        let Some(record) = self.live.get(entity).and_then(|s| self.records.get_mut(*s)) else {
            tracing::warn!(%entity, kind = ?entry.kind(), "component added to unknown entity, disposed");
            entry.dispose();
            return;
        };
        if record.contains_component(entry.tag()) {
            tracing::warn!(%entity, component = %entry.tag(), "duplicate component tag, disposed");
            entry.dispose();
            return;
        }

        entry.attach(entity.clone());
        record.push(entry);
        if let Some(added) = record.components.last() {
            self.notify.notify_add(&Change::Component(added));
        }
    }

    /// Removes every component matching `predicate`. Returns the count.
    fn remove_where<F>(&mut self, entity: &Tag, predicate: F) -> usize
    where
        F: Fn(&ComponentEntry) -> bool,
    {
        let Some(record) = self.live.get(entity).and_then(|s| self.records.get_mut(*s)) else {
            tracing::warn!(%entity, "component removal on unknown entity skipped");
            return 0;
        };

        let mut removed = 0;
        let mut index = 0;
        while index < record.components.len() {
            if predicate(&record.components[index]) {
                let mut entry = record.take(index);
                self.notify.notify_remove(&Change::Component(&entry));
                entry.dispose();
                removed += 1;
            } else {
                index += 1;
            }
        }
        removed
    }

    pub(crate) fn remove_component(&mut self, entity: &Tag, component: &Tag) {
        if self.is_live(entity) && self.remove_where(entity, |entry| entry.tag() == component) == 0 {
            tracing::warn!(%entity, %component, "removal of absent component skipped");
        }
    }

    pub(crate) fn remove_kind(&mut self, entity: &Tag, kind: Kind) -> usize {
        self.remove_where(entity, |entry| entry.kind() == kind)
    }

    pub(crate) fn update_component(&mut self, entity: &Tag, mut entry: ComponentEntry) {
        if !self.is_live(entity) {
            tracing::warn!(%entity, kind = ?entry.kind(), "update on unknown entity, disposed");
            entry.dispose();
            return;
        }
        self.remove_kind(entity, entry.kind());
        self.add_component(entity, entry);
    }

    pub(crate) fn insert_if_absent(&mut self, entity: &Tag, mut entry: ComponentEntry) {
        match self.record(entity) {
            Some(record) if record.kind_count(entry.kind()) > 0 => {
                tracing::trace!(%entity, kind = ?entry.kind(), "component already present");
                entry.dispose();
            }
            _ => self.add_component(entity, entry),
        }
    }

    pub(crate) fn add_flyweight(&mut self, entity: &Tag, flyweight: Flyweight) {
        let Some(record) = self.live.get(entity).and_then(|s| self.records.get_mut(*s)) else {
            tracing::warn!(%entity, flyweight = %flyweight.tag(), "flyweight added to unknown entity skipped");
            return;
        };

        if self.flyweights.add(entity.clone(), flyweight.clone()) {
            record.push_flyweight(flyweight);
            if let Some(added) = record.flyweights.last() {
                self.notify.notify_add(&Change::Flyweight {
                    entity,
                    flyweight: added,
                });
            }
        }
    }

    pub(crate) fn remove_flyweight(&mut self, entity: &Tag, flyweight: &Flyweight) {
        if let Some(record) = self.live.get(entity).and_then(|s| self.records.get_mut(*s)) {
            record.take_flyweight(flyweight);
        }
        self.release_flyweight(entity, flyweight);
    }

    fn release_flyweight(&mut self, entity: &Tag, flyweight: &Flyweight) {
        match self.flyweights.remove(entity, flyweight) {
            Release::ForeignDisposed => {
                self.notify.notify_remove(&Change::Flyweight { entity, flyweight });
                tracing::warn!(%entity, flyweight = %flyweight.tag(), "flyweight released by a non-member, disposed");
            }
            Release::Disposed => {
                tracing::trace!(flyweight = %flyweight.tag(), "flyweight disposed");
                self.notify.notify_remove(&Change::Flyweight { entity, flyweight });
            }
            Release::Retained { .. } => {
                self.notify.notify_remove(&Change::Flyweight { entity, flyweight });
            }
        }
    }

    /// Disposes every owned component and flyweight, then empties the store.
    pub(crate) fn dispose_all(&mut self) {
        for (_, record) in self.records.iter_mut() {
            for entry in &mut record.components {
                entry.dispose();
            }
        }
        self.records.clear();
        self.live.clear();
        self.flyweights.dispose_all();
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("entities", &self.live.len())
            .field("flyweights", &self.flyweights.len())
            .finish_non_exhaustive()
    }
}
