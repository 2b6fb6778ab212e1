//! # Memory Management
//!
//! Slot storage for entity records. Slots are recycled through a free list,
//! and handles are generation checked so a removed entity never resolves to
//! its slot's next occupant.

mod pool;

pub use pool::{SlotHandle, SlotPool};
