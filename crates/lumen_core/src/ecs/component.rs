//! # Component System
//!
//! Components are opaque data owned by exactly one entity. The store never
//! looks inside them: it only needs their kind (the concrete Rust type) and
//! their tag.
//!
//! Typed accessors recover the concrete type with a checked downcast, so a
//! lookup either yields the requested type or reports why it could not.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::tag::Tag;

/// Marker trait for owned components.
///
/// Any `Send + Sync + 'static` type can be a component. Override
/// [`Component::dispose`] to release resources (GPU buffers, file handles)
/// when the store removes the component.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Debug, Clone, PartialEq)]
/// struct Position { x: f32, y: f32, z: f32 }
///
/// impl Component for Position {}
/// ```
pub trait Component: Any + Send + Sync {
    /// Called exactly once when the store removes this component.
    fn dispose(&mut self) {}
}

/// Runtime identity of a component kind.
///
/// Equality and hashing use the [`TypeId`] only; the type name is kept for
/// error messages and logs.
#[derive(Clone, Copy)]
pub struct Kind {
    id: TypeId,
    name: &'static str,
}

impl Kind {
    /// Returns the kind of `T`.
    #[inline]
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the underlying type id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> TypeId {
        self.id
    }

    /// Returns the full type name.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Kind {}

impl Hash for Kind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Object-safe view of a component used by the store.
pub(crate) trait ErasedComponent: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dispose_erased(&mut self);
}

impl<T: Component> ErasedComponent for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dispose_erased(&mut self) {
        Component::dispose(self);
    }
}

/// A component together with its identity.
///
/// The owning entity is recorded when the add is committed; until then
/// [`ComponentEntry::entity`] is `None`.
pub struct ComponentEntry {
    tag: Tag,
    entity: Option<Tag>,
    kind: Kind,
    disposed: bool,
    value: Box<dyn ErasedComponent>,
}

impl ComponentEntry {
    /// Wraps a component under the given tag.
    ///
    /// Components of the same kind on one entity need distinct tags.
    #[must_use]
    pub fn new<T: Component>(tag: Tag, value: T) -> Self {
        Self {
            tag,
            entity: None,
            kind: Kind::of::<T>(),
            disposed: false,
            value: Box::new(value),
        }
    }

    /// Wraps a component under a freshly generated tag.
    #[must_use]
    pub fn wrap<T: Component>(value: T) -> Self {
        Self::new(Tag::generate(), value)
    }

    /// The component's own tag (its key inside the entity bucket).
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// The owning entity, set at commit time.
    #[inline]
    #[must_use]
    pub fn entity(&self) -> Option<&Tag> {
        self.entity.as_ref()
    }

    /// The component kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Returns true if the component is of kind `T`.
    #[inline]
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        self.kind.id == TypeId::of::<T>()
    }

    /// Downcasts to the concrete component type.
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.value.as_any().downcast_ref::<T>()
    }

    pub(crate) fn attach(&mut self, entity: Tag) {
        self.entity = Some(entity);
    }

    /// Disposes the inner value. Repeated calls are no-ops.
    pub(crate) fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.value.dispose_erased();
        }
    }
}

impl fmt::Debug for ComponentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentEntry")
            .field("tag", &self.tag)
            .field("entity", &self.entity)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Position {
        x: i32,
    }

    impl Component for Position {}

    struct Buffer {
        released: Arc<AtomicUsize>,
    }

    impl Component for Buffer {
        fn dispose(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_kind_equality_ignores_name() {
        assert_eq!(Kind::of::<Position>(), Kind::of::<Position>());
        assert_ne!(Kind::of::<Position>(), Kind::of::<Buffer>());
        assert!(Kind::of::<Position>().name().ends_with("Position"));
    }

    #[test]
    fn test_entry_downcast() {
        let entry = ComponentEntry::new(Tag::generate(), Position { x: 1 });
        assert!(entry.is::<Position>());
        assert_eq!(entry.downcast_ref::<Position>(), Some(&Position { x: 1 }));
        assert!(entry.downcast_ref::<Buffer>().is_none());
        assert!(entry.entity().is_none());
    }

    #[test]
    fn test_entry_dispose_runs_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut entry = ComponentEntry::new(
            Tag::generate(),
            Buffer {
                released: Arc::clone(&released),
            },
        );

        entry.dispose();
        entry.dispose();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
