//! # Element Tags
//!
//! Tags are the only key type used by the store. An entity, an owned
//! component and a flyweight component are all addressed by a [`Tag`].
//!
//! A tag is a plain value: two tags are equal when their name and key are
//! equal, no matter where they were created.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of generated keys. Zero is reserved for purely named tags.
static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Structural identifier for entities and components.
///
/// A tag is built from a stable seed:
/// - [`Tag::named`]: a human readable name (e.g. `"World"`, `"Camera"`)
/// - [`Tag::generate`]: a process-unique generated key
/// - [`Tag::with_key`]: both, for callers that keep their own key space
///
/// Cloning is cheap (the name is reference counted).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    /// Generated or caller-provided key (0 for named tags).
    key: u64,
    /// Optional name.
    name: Option<Arc<str>>,
}

impl Tag {
    /// Creates a tag identified by name only.
    ///
    /// Two calls with the same name produce equal tags.
    #[must_use]
    pub fn named(name: impl AsRef<str>) -> Self {
        Self {
            key: 0,
            name: Some(Arc::from(name.as_ref())),
        }
    }

    /// Creates a tag with a fresh process-unique key.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            key: NEXT_KEY.fetch_add(1, Ordering::Relaxed),
            name: None,
        }
    }

    /// Creates a tag from an explicit name and key.
    #[must_use]
    pub fn with_key(name: impl AsRef<str>, key: u64) -> Self {
        Self {
            key,
            name: Some(Arc::from(name.as_ref())),
        }
    }

    /// Creates a generated tag that also carries a name for diagnostics.
    ///
    /// The key keeps it distinct from every other tag with the same name.
    #[must_use]
    pub fn unique(name: impl AsRef<str>) -> Self {
        Self::with_key(name, NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// The empty tag. Used by empty entity handles; never live.
    #[must_use]
    pub const fn empty() -> Self {
        Self { key: 0, name: None }
    }

    /// Returns true for [`Tag::empty`].
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key == 0 && self.name.is_none()
    }

    /// Returns the key portion.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> u64 {
        self.key
    }

    /// Returns the name portion, if any.
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.key) {
            (None, 0) => f.write_str("<empty>"),
            (Some(name), 0) => f.write_str(name),
            (None, key) => write!(f, "#{key}"),
            (Some(name), key) => write!(f, "{name}#{key}"),
        }
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_named_tags_are_structural() {
        let a = Tag::named("Camera");
        let b = Tag::named(String::from("Camera"));
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_generated_tags_are_distinct() {
        let a = Tag::generate();
        let b = Tag::generate();
        assert_ne!(a, b);
        assert_ne!(a.key(), 0);
    }

    #[test]
    fn test_unique_keeps_name_but_not_equality() {
        let a = Tag::unique("Light");
        let b = Tag::unique("Light");
        assert_eq!(a.name(), Some("Light"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_tag() {
        assert!(Tag::empty().is_empty());
        assert!(!Tag::named("x").is_empty());
        assert_eq!(Tag::empty().to_string(), "<empty>");
        assert_eq!(Tag::with_key("Mesh", 7).to_string(), "Mesh#7");
    }
}
