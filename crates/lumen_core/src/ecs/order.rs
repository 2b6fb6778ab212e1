//! # Order Index
//!
//! Per-entity, per-system ordering for systems that must walk entities in a
//! registered sequence (render passes, z-ordered overlays).
//!
//! The index is an explicit service owned by the manager; there is no
//! process-wide counter. Registration is append-only.

use std::any::TypeId;
use std::collections::HashMap;

use super::tag::Tag;

/// Order reported for entities never registered with a system.
///
/// Sorts after every registered order.
pub const UNORDERED: i32 = i32::MAX;

/// Mapping of entity -> system kind -> order.
#[derive(Debug, Default)]
pub struct OrderIndex {
    orders: HashMap<Tag, HashMap<TypeId, i32>>,
    /// Last order handed out per system kind.
    counters: HashMap<TypeId, i32>,
}

impl OrderIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `entity` with an explicit order for system `S`.
    ///
    /// The per-system counter still advances, so later automatic
    /// registrations continue after this one.
    pub fn register_with<S: 'static>(&mut self, entity: &Tag, order: i32) -> &mut Self {
        let system = TypeId::of::<S>();
        self.next_order(system);
        self.insert(entity, system, order);
        self
    }

    /// Registers `entity` for system `S` using the next automatic order.
    ///
    /// Counters are independent per system kind and start at zero.
    pub fn register<S: 'static>(&mut self, entity: &Tag) -> &mut Self {
        let system = TypeId::of::<S>();
        let order = self.next_order(system);
        self.insert(entity, system, order);
        self
    }

    /// Returns the order of `entity` for system `S`, or [`UNORDERED`].
    #[must_use]
    pub fn get<S: 'static>(&self, entity: &Tag) -> i32 {
        self.orders
            .get(entity)
            .and_then(|systems| systems.get(&TypeId::of::<S>()))
            .copied()
            .unwrap_or(UNORDERED)
    }

    /// Returns true if `entity` has an order for system `S`.
    #[must_use]
    pub fn is_registered<S: 'static>(&self, entity: &Tag) -> bool {
        self.orders
            .get(entity)
            .is_some_and(|systems| systems.contains_key(&TypeId::of::<S>()))
    }

    /// Sorts tags by their order for system `S`; unregistered tags go last.
    pub fn sort_by_order<S: 'static>(&self, tags: &mut [Tag]) {
        tags.sort_by_key(|tag| self.get::<S>(tag));
    }

    fn next_order(&mut self, system: TypeId) -> i32 {
        let counter = self
            .counters
            .entry(system)
            .and_modify(|c| *c = c.saturating_add(1))
            .or_insert(0);
        *counter
    }

    fn insert(&mut self, entity: &Tag, system: TypeId, order: i32) {
        let systems = self.orders.entry(entity.clone()).or_default();
        if systems.contains_key(&system) {
            tracing::warn!(%entity, order, "order already registered, keeping the first");
            return;
        }
        systems.insert(system, order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RenderPass;
    struct OverlayPass;

    #[test]
    fn test_auto_increment_per_system() {
        let mut index = OrderIndex::new();
        let a = Tag::named("A");
        let b = Tag::named("B");

        index.register::<RenderPass>(&a).register::<RenderPass>(&b);
        index.register::<OverlayPass>(&b);

        assert_eq!(index.get::<RenderPass>(&a), 0);
        assert_eq!(index.get::<RenderPass>(&b), 1);
        assert_eq!(index.get::<OverlayPass>(&b), 0);
    }

    #[test]
    fn test_explicit_order_advances_counter() {
        let mut index = OrderIndex::new();
        let a = Tag::named("A");
        let b = Tag::named("B");

        index.register_with::<RenderPass>(&a, 10);
        index.register::<RenderPass>(&b);

        assert_eq!(index.get::<RenderPass>(&a), 10);
        assert_eq!(index.get::<RenderPass>(&b), 1);
    }

    #[test]
    fn test_unregistered_sorts_last() {
        let mut index = OrderIndex::new();
        let a = Tag::named("A");
        let b = Tag::named("B");
        let c = Tag::named("C");

        index.register_with::<RenderPass>(&b, 5);
        index.register_with::<RenderPass>(&c, -3);

        assert_eq!(index.get::<RenderPass>(&a), UNORDERED);
        assert_eq!(index.get::<OverlayPass>(&b), UNORDERED);
        assert!(!index.is_registered::<OverlayPass>(&b));

        let mut tags = vec![a.clone(), b.clone(), c.clone()];
        index.sort_by_order::<RenderPass>(&mut tags);
        assert_eq!(tags, vec![c, b, a]);
    }

    #[test]
    fn test_first_registration_wins() {
        let mut index = OrderIndex::new();
        let a = Tag::named("A");

        index.register_with::<RenderPass>(&a, 3);
        index.register_with::<RenderPass>(&a, 9);
        assert_eq!(index.get::<RenderPass>(&a), 3);
    }
}
