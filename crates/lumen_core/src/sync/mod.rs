//! # Synchronization
//!
//! Deferred mutation for a store that is read by systems and written by
//! many threads.
//!
//! ## Design
//!
//! ```text
//! Producers (any thread)         Owner thread
//! ┌──────────────┐              ┌─────────────────────────┐
//! │ enqueue(cmd) │──pending──>  │ begin_synchronize()     │
//! └──────────────┘              │ end_synchronize(owner)  │
//!                               └─────────────────────────┘
//! ```
//!
//! Readers never observe a half-applied batch: commits take `&mut` access to
//! the owner, so no reader can hold a borrow while a batch is applied.

mod context;

pub use context::{ApplyFn, Command, CommandSender, Phase, SyncContext, SyncError};
