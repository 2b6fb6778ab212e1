//! # Input
//!
//! The loop polls one [`InputSource`] per frame: `synchronize` on the loop
//! thread, then `snapshot` for the events of the current frame.
//!
//! [`ChannelInput`] is the stock source. Window and device callbacks push
//! events through cloneable [`InputSender`]s from any thread; each
//! `synchronize` drains the channel into the current frame's snapshot.
//!
//! ```text
//! ┌─────────────┐  InputSender   ┌──────────────┐  snapshot   ┌────────────┐
//! │ UI callback │───────────────>│ ChannelInput │────────────>│ Frame Loop │
//! └─────────────┘   (bounded)    └──────────────┘             └────────────┘
//! ```

use std::thread::ThreadId;
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::config::EngineConfig;

/// Device event delivered to systems.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    /// A key was pressed.
    KeyDown(u32),
    /// A key was released.
    KeyUp(u32),
    /// The pointer moved to a position in surface pixels.
    PointerMoved {
        /// Horizontal position.
        x: f32,
        /// Vertical position.
        y: f32,
    },
    /// A pointer button was pressed.
    PointerDown {
        /// Button index.
        button: u8,
    },
    /// A pointer button was released.
    PointerUp {
        /// Button index.
        button: u8,
    },
    /// Wheel scrolled.
    Wheel {
        /// Scroll amount in lines.
        delta: f32,
    },
    /// The render surface changed size.
    Resized {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
}

/// Events of one frame.
#[derive(Clone, Debug)]
pub struct InputSnapshot {
    /// Events received since the previous frame, in arrival order.
    pub events: Vec<InputEvent>,
    /// When the snapshot was taken.
    pub timestamp: Instant,
}

impl InputSnapshot {
    /// A snapshot without events.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            events: Vec::new(),
            timestamp: Instant::now(),
        }
    }

    /// Returns true if no event arrived this frame.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Source of per-frame input.
pub trait InputSource: Send {
    /// Called once per frame on the loop thread before `snapshot`.
    fn synchronize(&mut self, thread: ThreadId);

    /// The events of the current frame.
    fn snapshot(&self) -> InputSnapshot;
}

/// Source that never produces events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl InputSource for NoInput {
    fn synchronize(&mut self, _thread: ThreadId) {}

    fn snapshot(&self) -> InputSnapshot {
        InputSnapshot::empty()
    }
}

/// Producer handle for [`ChannelInput`].
#[derive(Clone, Debug)]
pub struct InputSender {
    sender: Sender<InputEvent>,
}

impl InputSender {
    /// Sends an event without blocking.
    ///
    /// Returns false if the channel is full or the source is gone; the event
    /// is dropped so input never stalls the caller.
    #[inline]
    pub fn send(&self, event: InputEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("input channel full, event dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Input source fed through a bounded channel.
#[derive(Debug)]
pub struct ChannelInput {
    sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    current: InputSnapshot,
    owner: Option<ThreadId>,
}

impl ChannelInput {
    /// Creates a source buffering up to `capacity` events between frames.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            current: InputSnapshot::empty(),
            owner: None,
        }
    }

    /// Creates a source bounded by `input_capacity`.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.input_capacity)
    }

    /// A producer handle.
    #[must_use]
    pub fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
        }
    }

    /// Events waiting for the next `synchronize`.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// The thread that last synchronized this source.
    #[must_use]
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner
    }
}

impl InputSource for ChannelInput {
    fn synchronize(&mut self, thread: ThreadId) {
        if self.owner.is_some_and(|owner| owner != thread) {
            tracing::warn!(?thread, "input synchronized from a different thread");
        }
        self.owner = Some(thread);

        self.current = InputSnapshot {
            events: self.receiver.try_iter().collect(),
            timestamp: Instant::now(),
        };
    }

    fn snapshot(&self) -> InputSnapshot {
        self.current.clone()
    }
}
