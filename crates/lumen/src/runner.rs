//! # Engine Runner
//!
//! Moves a [`FrameLoop`] onto a dedicated, named thread.
//!
//! ```text
//! caller thread                      loop thread ("Game Loop")
//! ─────────────                      ─────────────────────────
//! Engine::run(frame_loop) ─spawn──>  bind owner, first commit
//! handle.requests().…  ──queue──>    frame, frame, frame, …
//! handle.stop()        ──cancel──>   finish current frame
//!                      <──join────   FrameLoop returned
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use lumen_core::Requests;
use parking_lot::Mutex;

use crate::error::{EngineError, EngineResult};
use crate::game_loop::{FrameLoop, FrameStatsAccumulator};

/// Cooperative stop signal, checked between frames.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) was called on any clone.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Entry point for running a loop on its own thread.
#[derive(Debug)]
pub struct Engine;

impl Engine {
    /// Spawns the loop thread, named after `thread_name` in the loop's
    /// configuration, and starts running frames.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Spawn`] if the thread cannot be created.
    pub fn run(frame_loop: FrameLoop) -> EngineResult<EngineHandle> {
        let cancel = CancellationToken::new();
        let requests = frame_loop.requests();
        let stats = frame_loop.shared_stats();
        let name = frame_loop.config().thread_name.clone();

        let loop_cancel = cancel.clone();
        let join = thread::Builder::new()
            .name(name)
            .spawn(move || {
                let mut frame_loop = frame_loop;
                if let Err(error) = frame_loop.run_until(&loop_cancel) {
                    tracing::error!(%error, "frame loop terminated");
                    return Err(error);
                }
                Ok(frame_loop)
            })
            .map_err(EngineError::Spawn)?;

        Ok(EngineHandle {
            cancel,
            join: Some(join),
            requests,
            stats,
        })
    }
}

/// Handle to a running loop.
///
/// Dropping the handle cancels the loop and waits for it.
pub struct EngineHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<EngineResult<FrameLoop>>>,
    requests: Requests,
    stats: Arc<Mutex<FrameStatsAccumulator>>,
}

impl EngineHandle {
    /// A producer handle into the running loop's manager.
    #[must_use]
    pub fn requests(&self) -> Requests {
        self.requests.clone()
    }

    /// The loop's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Copy of the statistics recorded so far.
    #[must_use]
    pub fn stats(&self) -> FrameStatsAccumulator {
        self.stats.lock().clone()
    }

    /// Returns true if the loop thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancels the loop, waits for the current frame to finish and returns
    /// the loop with its manager intact.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the loop, or
    /// [`EngineError::LoopPanicked`] if the loop thread panicked.
    pub fn stop(mut self) -> EngineResult<FrameLoop> {
        self.cancel.cancel();
        match self.join.take() {
            Some(join) => join.join().map_err(|_| EngineError::LoopPanicked)?,
            None => Err(EngineError::LoopPanicked),
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}
