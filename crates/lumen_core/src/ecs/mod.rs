//! # Entity Component System
//!
//! Entity and component storage with deferred, batched mutation.
//!
//! ## Design Philosophy
//!
//! - Entities are tags; their data lives in generation-checked slots
//! - Components are opaque, typed by their concrete Rust type
//! - Every structural change is a request, applied at a commit point
//! - Systems always read a fully committed store

mod component;
mod error;
mod flyweight;
mod handle;
mod manager;
mod notify;
mod order;
mod store;
mod tag;

pub use component::{Component, ComponentEntry, Kind};
pub use error::{StoreError, StoreResult};
pub use flyweight::{Flyweight, FlyweightComponent, FlyweightRegistry, Release};
pub use handle::{EntityBuilder, EntityHandle, EntityKey};
pub use manager::{EntityComponentManager, EntityFilter, Requests};
pub use notify::{Change, ChangeNotify, Notificator, NullNotify};
pub use order::{OrderIndex, UNORDERED};
pub use store::{EntityRecord, Store};
pub use tag::Tag;
