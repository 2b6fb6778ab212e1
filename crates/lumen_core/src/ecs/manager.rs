//! # Entity Component Manager
//!
//! Owns the committed [`Store`] and the three synchronization contexts that
//! guard it: entity lifecycle, owned components and flyweight components.
//!
//! ## Access Rules
//!
//! - Reads take `&self` and see the last committed state only.
//! - Requests take `&self`, from any thread through [`Requests`], and only
//!   take effect at the next commit.
//! - Commits take `&mut self` and run on the owner thread.
//!
//! ## Commit Order
//!
//! ```text
//! begin:  flyweight -> component -> entity
//! end:    entity -> component -> flyweight
//! ```
//!
//! An entity created in a cycle is live before its components are attached
//! in the same cycle.

use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;

use super::component::{Component, ComponentEntry, Kind};
use super::error::{StoreError, StoreResult};
use super::flyweight::{Flyweight, FlyweightRegistry};
use super::handle::{EntityBuilder, EntityHandle, EntityKey};
use super::notify::{ChangeNotify, NullNotify};
use super::order::OrderIndex;
use super::store::Store;
use super::tag::Tag;
use crate::sync::{Command, CommandSender, SyncContext, SyncError};

type EntitySync = SyncContext<Store, Tag>;
type ComponentSync = SyncContext<Store, Tag>;
type FlyweightSync = SyncContext<Store, Flyweight>;

/// Entity filter applied by [`EntityComponentManager::entities`].
pub type EntityFilter = Box<dyn Fn(&EntityHandle<'_>) -> bool + Send + Sync>;

/// Cloneable producer handle for mutation requests.
///
/// Every request is deferred: it is appended to the matching context and
/// applied at the next commit. Safe to share with input callbacks and
/// loader threads.
#[derive(Clone)]
pub struct Requests {
    entities: CommandSender<Store, Tag>,
    components: CommandSender<Store, Tag>,
    flyweights: CommandSender<Store, Flyweight>,
}

impl Requests {
    /// Requests creation of an entity. Chain components onto the returned
    /// builder.
    pub fn create_entity(&self, tag: Tag) -> EntityBuilder<'_> {
        self.entities.send(Command::new(tag.clone(), |store: &mut Store, tag| {
            store.create_entity(tag);
        }));
        EntityBuilder::new(self, tag)
    }

    /// Requests removal of an entity with all its components and flyweight
    /// memberships.
    pub fn remove_entity(&self, entity: &Tag) {
        self.entities.send(Command::new(entity.clone(), |store: &mut Store, tag| {
            store.remove_entity(&tag);
        }));
    }

    /// Requests registration of `entity` for system `S` with the next
    /// automatic order.
    pub fn register_order<S: 'static>(&self, entity: &Tag) {
        self.entities.send(Command::new(entity.clone(), |store: &mut Store, tag| {
            store.order_mut().register::<S>(&tag);
        }));
    }

    /// Requests registration of `entity` for system `S` with an explicit
    /// order.
    pub fn register_order_with<S: 'static>(&self, entity: &Tag, order: i32) {
        self.entities.send(Command::new(entity.clone(), move |store: &mut Store, tag| {
            store.order_mut().register_with::<S>(&tag, order);
        }));
    }

    /// Requests attaching a component under a generated tag.
    ///
    /// Returns the component tag.
    pub fn add_component<T: Component>(&self, entity: &Tag, component: T) -> Tag {
        let entry = ComponentEntry::wrap(component);
        let tag = entry.tag().clone();
        self.add_entry(entity, entry);
        tag
    }

    /// Requests attaching an already wrapped component.
    pub fn add_entry(&self, entity: &Tag, entry: ComponentEntry) {
        self.components.send(Command::new(entity.clone(), move |store: &mut Store, tag| {
            store.add_component(&tag, entry);
        }));
    }

    /// Requests attaching several components, preserving their order.
    pub fn add_components<I>(&self, entity: &Tag, entries: I)
    where
        I: IntoIterator<Item = ComponentEntry>,
    {
        self.components.send_all(entries.into_iter().map(|entry| {
            Command::new(entity.clone(), move |store: &mut Store, tag: Tag| {
                store.add_component(&tag, entry);
            })
        }));
    }

    /// Requests removal of one component by its tag.
    pub fn remove_component(&self, entity: &Tag, component: &Tag) {
        let component = component.clone();
        self.components.send(Command::new(entity.clone(), move |store: &mut Store, tag| {
            store.remove_component(&tag, &component);
        }));
    }

    /// Requests removal of several components by tag.
    pub fn remove_components<I>(&self, entity: &Tag, components: I)
    where
        I: IntoIterator<Item = Tag>,
    {
        self.components.send_all(components.into_iter().map(|component| {
            Command::new(entity.clone(), move |store: &mut Store, tag: Tag| {
                store.remove_component(&tag, &component);
            })
        }));
    }

    /// Requests removal of every component of kind `K`. Matches are resolved
    /// at commit time.
    pub fn remove_components_of_kind<K: Component>(&self, entity: &Tag) {
        self.components.send(Command::new(entity.clone(), |store: &mut Store, tag| {
            store.remove_kind(&tag, Kind::of::<K>());
        }));
    }

    /// Requests replacing every component of kind `K` with `value`, or
    /// inserting it if none exists.
    pub fn update_component<K: Component>(&self, entity: &Tag, value: K) {
        let entry = ComponentEntry::wrap(value);
        self.components.send(Command::new(entity.clone(), move |store: &mut Store, tag| {
            store.update_component(&tag, entry);
        }));
    }

    /// Requests inserting `value` unless a component of kind `K` exists at
    /// commit time.
    pub fn insert_if_absent<K: Component>(&self, entity: &Tag, value: K) {
        let entry = ComponentEntry::wrap(value);
        self.components.send(Command::new(entity.clone(), move |store: &mut Store, tag| {
            store.insert_if_absent(&tag, entry);
        }));
    }

    /// Requests adding `entity` to the members of a flyweight.
    pub fn add_flyweight(&self, entity: &Tag, flyweight: Flyweight) {
        let entity = entity.clone();
        self.flyweights.send(Command::new(flyweight, move |store: &mut Store, fw| {
            store.add_flyweight(&entity, fw);
        }));
    }

    /// Requests releasing `entity`'s membership of a flyweight.
    pub fn remove_flyweight(&self, entity: &Tag, flyweight: &Flyweight) {
        let entity = entity.clone();
        self.flyweights.send(Command::new(flyweight.clone(), move |store: &mut Store, fw| {
            store.remove_flyweight(&entity, &fw);
        }));
    }
}

impl fmt::Debug for Requests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requests")
            .field("entities", &self.entities.pending_len())
            .field("components", &self.components.pending_len())
            .field("flyweights", &self.flyweights.pending_len())
            .finish()
    }
}

/// The entity/component manager.
pub struct EntityComponentManager {
    store: Store,
    entity_sync: EntitySync,
    component_sync: ComponentSync,
    flyweight_sync: FlyweightSync,
    requests: Requests,
    /// Set when a frame commit applied changes; cleared by `synchronize`.
    frame_changes: bool,
    filter: Option<EntityFilter>,
    disposed: bool,
}

impl Default for EntityComponentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityComponentManager {
    /// Creates a manager without a change notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::with_notify(Arc::new(NullNotify))
    }

    /// Creates a manager reporting committed changes to `notify`.
    #[must_use]
    pub fn with_notify(notify: Arc<dyn ChangeNotify>) -> Self {
        let entity_sync = EntitySync::new("entity");
        let component_sync = ComponentSync::new("component");
        let flyweight_sync = FlyweightSync::new("flyweight");
        let requests = Requests {
            entities: entity_sync.sender(),
            components: component_sync.sender(),
            flyweights: flyweight_sync.sender(),
        };

        Self {
            store: Store::new(notify),
            entity_sync,
            component_sync,
            flyweight_sync,
            requests,
            frame_changes: false,
            filter: None,
            disposed: false,
        }
    }

    /// A producer handle for other threads.
    #[must_use]
    pub fn requests(&self) -> Requests {
        self.requests.clone()
    }

    pub(crate) fn requests_ref(&self) -> &Requests {
        &self.requests
    }

    /// The committed store.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Binds the thread allowed to commit.
    pub fn bind_owner(&mut self, thread: ThreadId) {
        self.entity_sync.bind_owner(thread);
        self.component_sync.bind_owner(thread);
        self.flyweight_sync.bind_owner(thread);
    }

    /// Commits every pending request and clears the frame-change latch.
    ///
    /// # Errors
    ///
    /// [`SyncError::ThreadAffinity`] if `thread` is not the bound owner.
    pub fn synchronize(&mut self, thread: ThreadId) -> Result<(), SyncError> {
        self.frame_changes = false;
        self.commit(thread)
    }

    /// Commits every pending request, remembering whether anything changed
    /// so the next frame is not treated as idle.
    ///
    /// # Errors
    ///
    /// [`SyncError::ThreadAffinity`] if `thread` is not the bound owner.
    pub fn frame_synchronize(&mut self, thread: ThreadId) -> Result<(), SyncError> {
        if !self.frame_changes {
            self.frame_changes = self.has_pending();
        }
        self.commit(thread)
    }

    fn commit(&mut self, thread: ThreadId) -> Result<(), SyncError> {
        self.flyweight_sync.begin_synchronize();
        self.component_sync.begin_synchronize();
        self.entity_sync.begin_synchronize();

        self.entity_sync.end_synchronize(&mut self.store, thread)?;
        self.component_sync.end_synchronize(&mut self.store, thread)?;
        self.flyweight_sync.end_synchronize(&mut self.store, thread)?;
        Ok(())
    }

    fn has_pending(&self) -> bool {
        self.entity_sync.has_changes()
            || self.component_sync.has_changes()
            || self.flyweight_sync.has_changes()
    }

    /// Returns true if requests are waiting or the last frame committed
    /// changes.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.frame_changes || self.has_pending()
    }

    /// Forces the next [`has_changes`](Self::has_changes) to report true.
    pub fn push_synchronization(&mut self) {
        self.frame_changes = true;
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// See [`Requests::create_entity`].
    pub fn create_entity(&self, tag: Tag) -> EntityBuilder<'_> {
        self.requests.create_entity(tag)
    }

    /// See [`Requests::remove_entity`].
    pub fn remove_entity(&self, entity: &Tag) {
        self.requests.remove_entity(entity);
    }

    /// See [`Requests::add_component`].
    pub fn add_component<T: Component>(&self, entity: &Tag, component: T) -> Tag {
        self.requests.add_component(entity, component)
    }

    /// See [`Requests::add_components`].
    pub fn add_components<I>(&self, entity: &Tag, entries: I)
    where
        I: IntoIterator<Item = ComponentEntry>,
    {
        self.requests.add_components(entity, entries);
    }

    /// See [`Requests::remove_component`].
    pub fn remove_component(&self, entity: &Tag, component: &Tag) {
        self.requests.remove_component(entity, component);
    }

    /// See [`Requests::remove_components`].
    pub fn remove_components<I>(&self, entity: &Tag, components: I)
    where
        I: IntoIterator<Item = Tag>,
    {
        self.requests.remove_components(entity, components);
    }

    /// See [`Requests::remove_components_of_kind`].
    pub fn remove_components_of_kind<K: Component>(&self, entity: &Tag) {
        self.requests.remove_components_of_kind::<K>(entity);
    }

    /// See [`Requests::update_component`].
    pub fn update_component<K: Component>(&self, entity: &Tag, value: K) {
        self.requests.update_component(entity, value);
    }

    /// Returns the committed component of kind `K`, or requests inserting
    /// `default` and returns `None`.
    ///
    /// The insert is conditional, so racing calls add at most one.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownEntity`] if the
    /// entity is not live, [`StoreError::Ambiguous`]
    /// if several components of kind `K` exist.
    pub fn get_or_create<K: Component>(&self, entity: &Tag, default: K) -> StoreResult<Option<&K>> {
        let record = self
            .store
            .record(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.clone()))?;
        if record.kind_count(Kind::of::<K>()) == 0 {
            self.requests.insert_if_absent(entity, default);
            return Ok(None);
        }
        record.get::<K>().map(Some)
    }

    /// See [`Requests::add_flyweight`].
    pub fn add_flyweight(&self, entity: &Tag, flyweight: Flyweight) {
        self.requests.add_flyweight(entity, flyweight);
    }

    /// See [`Requests::remove_flyweight`].
    pub fn remove_flyweight(&self, entity: &Tag, flyweight: &Flyweight) {
        self.requests.remove_flyweight(entity, flyweight);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns true if the entity is live.
    #[must_use]
    pub fn is_live(&self, entity: &Tag) -> bool {
        self.store.is_live(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.store.entity_count()
    }

    /// Returns a handle to `entity`, or an empty handle if it is not live.
    #[must_use]
    pub fn get_entity(&self, entity: &Tag) -> EntityHandle<'_> {
        match self.store.slot_of(entity) {
            Some(slot) => EntityHandle::bound(self, entity.clone(), slot),
            None => EntityHandle::empty(self),
        }
    }

    /// Re-binds a detached key.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownEntity`] if the
    /// entity was removed since the key was taken, even if an entity with
    /// the same tag has been created again.
    pub fn resolve(&self, key: &EntityKey) -> StoreResult<EntityHandle<'_>> {
        match self.store.record_at(key.slot()) {
            Some(record) if record.tag() == key.tag() => {
                Ok(EntityHandle::bound(self, key.tag().clone(), key.slot()))
            }
            _ => Err(StoreError::UnknownEntity(key.tag().clone())),
        }
    }

    /// Installs a filter applied by [`entities`](Self::entities).
    pub fn set_filter<F>(&mut self, filter: F)
    where
        F: Fn(&EntityHandle<'_>) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
    }

    /// Removes the entity filter.
    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    /// Live entities passing the installed filter, in slot order.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityHandle<'_>> {
        match &self.filter {
            Some(filter) => self.entities_where(|handle| filter(handle)),
            None => self.entities_where(|_| true),
        }
    }

    /// Live entities matching `predicate`, in slot order. Ignores the
    /// installed filter.
    pub fn entities_where<P>(&self, predicate: P) -> Vec<EntityHandle<'_>>
    where
        P: Fn(&EntityHandle<'_>) -> bool,
    {
        self.store
            .records()
            .map(|(slot, record)| EntityHandle::bound(self, record.tag().clone(), slot))
            .filter(|handle| predicate(handle))
            .collect()
    }

    /// See [`Store::get_component`].
    ///
    /// # Errors
    ///
    /// Unknown entity, zero or several matches.
    pub fn get_component<K: Component>(&self, entity: &Tag) -> StoreResult<&K> {
        self.store.get_component::<K>(entity)
    }

    /// See [`Store::get_components`].
    #[must_use]
    pub fn get_components<K: Component>(&self, entity: &Tag) -> Vec<&K> {
        self.store.get_components::<K>(entity)
    }

    /// See [`Store::components`].
    #[must_use]
    pub fn components(&self, entity: &Tag) -> &[ComponentEntry] {
        self.store.components(entity)
    }

    /// See [`Store::components_of_kinds`].
    #[must_use]
    pub fn components_of_kinds(&self, entity: &Tag, kinds: &[Kind]) -> Vec<&ComponentEntry> {
        self.store.components_of_kinds(entity, kinds)
    }

    /// See [`Store::has`].
    #[must_use]
    pub fn has<K: Component>(&self, entity: &Tag) -> bool {
        self.store.has::<K>(entity)
    }

    /// See [`Store::has_kinds`].
    #[must_use]
    pub fn has_kinds(&self, entity: &Tag, kinds: &[Kind]) -> bool {
        self.store.has_kinds(entity, kinds)
    }

    /// See [`Store::try_get`].
    #[must_use]
    pub fn try_get<K: Component>(&self, entity: &Tag) -> Option<&K> {
        self.store.try_get::<K>(entity)
    }

    /// See [`Store::try_get2`].
    #[must_use]
    pub fn try_get2<A: Component, B: Component>(&self, entity: &Tag) -> Option<(&A, &B)> {
        self.store.try_get2::<A, B>(entity)
    }

    /// See [`Store::all_components_of`].
    #[must_use]
    pub fn all_components_of<K: Component>(&self) -> Vec<(&Tag, &K)> {
        self.store.all_components_of::<K>()
    }

    /// Flyweights referenced by `entity`.
    #[must_use]
    pub fn flyweights_of(&self, entity: &Tag) -> &[Flyweight] {
        self.store.flyweights_of(entity)
    }

    /// The flyweight registry.
    #[must_use]
    pub fn flyweights(&self) -> &FlyweightRegistry {
        self.store.flyweights()
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    /// The order index.
    #[must_use]
    pub fn order(&self) -> &OrderIndex {
        self.store.order()
    }

    /// Direct access to the order index, for registration outside a frame.
    pub fn order_mut(&mut self) -> &mut OrderIndex {
        self.store.order_mut()
    }

    /// Order of `entity` for system `S`.
    #[must_use]
    pub fn get_order<S: 'static>(&self, entity: &Tag) -> i32 {
        self.store.order().get::<S>(entity)
    }

    // =========================================================================
    // Disposal
    // =========================================================================

    /// Drops pending requests and disposes every committed component and
    /// flyweight. Further commits apply to an empty store.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.entity_sync.clear();
        self.component_sync.clear();
        self.flyweight_sync.clear();
        self.store.dispose_all();
        tracing::trace!("manager disposed");
    }

    /// Returns true once [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for EntityComponentManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for EntityComponentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityComponentManager")
            .field("store", &self.store)
            .field("entity_sync", &self.entity_sync)
            .field("component_sync", &self.component_sync)
            .field("flyweight_sync", &self.flyweight_sync)
            .field("frame_changes", &self.frame_changes)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}
