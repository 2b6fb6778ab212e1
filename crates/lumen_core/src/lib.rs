//! # LUMEN Core
//!
//! Entity/component store for a real-time renderer, built so that any
//! thread can request structural changes while a single owner thread
//! applies them at well-defined commit points.
//!
//! ## Architecture Rules
//!
//! 1. **Requests are deferred** - mutation calls only append to a queue
//! 2. **One committer** - only the owner thread applies queued requests
//! 3. **Stable reads** - readers see the last committed state, never a partial batch
//!
//! ## Example
//!
//! ```rust,ignore
//! use lumen_core::{Component, EntityComponentManager, Tag};
//!
//! struct Position { x: f32 }
//! impl Component for Position {}
//!
//! let mut ecm = EntityComponentManager::new();
//! let a = Tag::named("A");
//! ecm.create_entity(a.clone()).with(Position { x: 1.0 });
//!
//! // Not visible yet.
//! assert!(!ecm.is_live(&a));
//!
//! ecm.synchronize(std::thread::current().id())?;
//! assert!(ecm.get_component::<Position>(&a).is_ok());
//! ```

#![deny(unsafe_code)]

pub mod ecs;
pub mod memory;
pub mod sync;

pub use ecs::{
    Change, ChangeNotify, Component, ComponentEntry, EntityBuilder, EntityComponentManager,
    EntityHandle, EntityKey, Flyweight, FlyweightComponent, Kind, Notificator, NullNotify,
    OrderIndex, Release, Requests, StoreError, StoreResult, Tag, UNORDERED,
};
pub use memory::{SlotHandle, SlotPool};
pub use sync::{Command, CommandSender, SyncContext, SyncError};
