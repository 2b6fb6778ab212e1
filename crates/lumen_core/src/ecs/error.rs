//! # Store Error Types
//!
//! Errors reported by typed reads against the committed store.

use thiserror::Error;

use super::tag::Tag;

/// Errors that can occur when reading from the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The identifier is not live (never created, not yet committed, or
    /// removed).
    #[error("unknown entity: {0}")]
    UnknownEntity(Tag),

    /// The entity has no component of the requested kind.
    #[error("entity {entity} has no component of kind {kind}")]
    NotFound {
        /// The entity that was queried.
        entity: Tag,
        /// The requested kind.
        kind: &'static str,
    },

    /// The entity has more than one component of the requested kind.
    #[error("entity {entity} has {count} components of kind {kind}, expected one")]
    Ambiguous {
        /// The entity that was queried.
        entity: Tag,
        /// The requested kind.
        kind: &'static str,
        /// Number of matching components.
        count: usize,
    },
}

/// Result type for store reads.
pub type StoreResult<T> = Result<T, StoreError>;
