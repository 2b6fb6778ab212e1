//! # Synchronization Context
//!
//! A deferred command queue with many producers and a single committer.
//!
//! ## Phases
//!
//! ```text
//!   enqueue (any thread) ──> pending ──begin──> staged ──end(owner)──> applied
//!
//!   Idle ──begin_synchronize──> Staged ──end_synchronize──> Applying ──> Idle
//! ```
//!
//! `begin_synchronize` moves the pending buffer into the staged buffer under
//! a short lock, so requests that arrive while the staged batch is being
//! applied land in the next cycle. `end_synchronize` runs the staged batch in
//! FIFO order against the owner, on the owner thread only.
//!
//! The pending buffer is the only structure shared across threads.

use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::Mutex;
use thiserror::Error;

/// Errors reported by the commit phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Commit was invoked from a thread other than the bound owner thread.
    #[error("synchronization context `{context}` is owned by {expected:?}, commit attempted from {actual:?}")]
    ThreadAffinity {
        /// Name of the context.
        context: &'static str,
        /// The bound owner thread.
        expected: ThreadId,
        /// The calling thread.
        actual: ThreadId,
    },
}

/// Mutation delegate applied to the owner at commit time.
pub type ApplyFn<O, P> = Box<dyn FnOnce(&mut O, P) + Send>;

/// A queued mutation: a delegate plus its input payload.
pub struct Command<O, P> {
    apply: ApplyFn<O, P>,
    input: P,
}

impl<O, P> Command<O, P> {
    /// Pairs a delegate with its payload.
    pub fn new<F>(input: P, apply: F) -> Self
    where
        F: FnOnce(&mut O, P) + Send + 'static,
    {
        Self {
            apply: Box::new(apply),
            input,
        }
    }

    /// The payload carried by this command.
    #[inline]
    pub fn input(&self) -> &P {
        &self.input
    }

    fn run(self, owner: &mut O) {
        (self.apply)(owner, self.input);
    }
}

impl<O, P: fmt::Debug> fmt::Debug for Command<O, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

type Pending<O, P> = Arc<Mutex<Vec<Command<O, P>>>>;

/// Producer side of a [`SyncContext`].
///
/// Cheap to clone and safe to move to any thread. Enqueueing never blocks
/// beyond the short append lock and never fails.
pub struct CommandSender<O, P> {
    pending: Pending<O, P>,
}

impl<O, P> Clone for CommandSender<O, P> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<O, P> CommandSender<O, P> {
    /// Appends one command.
    pub fn send(&self, command: Command<O, P>) {
        self.pending.lock().push(command);
    }

    /// Appends several commands in one lock, preserving their order.
    pub fn send_all<I>(&self, commands: I)
    where
        I: IntoIterator<Item = Command<O, P>>,
    {
        self.pending.lock().extend(commands);
    }

    /// Number of commands waiting for the next `begin_synchronize`.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<O, P> fmt::Debug for CommandSender<O, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSender")
            .field("pending", &self.pending_len())
            .finish()
    }
}

/// State of a context within one synchronization cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing staged.
    Idle,
    /// A batch was staged and awaits commit.
    Staged,
    /// The staged batch is being applied.
    Applying,
}

/// Deferred command queue for owner type `O` and payload type `P`.
pub struct SyncContext<O, P> {
    name: &'static str,
    pending: Pending<O, P>,
    staged: Vec<Command<O, P>>,
    owner_thread: Option<ThreadId>,
    phase: Phase,
}

impl<O, P> SyncContext<O, P> {
    /// Creates an empty context. The name shows up in logs and errors.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            pending: Arc::new(Mutex::new(Vec::new())),
            staged: Vec::new(),
            owner_thread: None,
            phase: Phase::Idle,
        }
    }

    /// The context name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns a producer handle sharing this context's pending buffer.
    #[must_use]
    pub fn sender(&self) -> CommandSender<O, P> {
        CommandSender {
            pending: Arc::clone(&self.pending),
        }
    }

    /// Appends one command to the pending buffer.
    pub fn enqueue(&self, command: Command<O, P>) {
        self.pending.lock().push(command);
    }

    /// Binds the thread allowed to commit.
    ///
    /// Until a thread is bound, any thread may commit (setup before the loop
    /// starts).
    pub fn bind_owner(&mut self, thread: ThreadId) {
        self.owner_thread = Some(thread);
    }

    /// The bound owner thread, if any.
    #[must_use]
    pub fn owner_thread(&self) -> Option<ThreadId> {
        self.owner_thread
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Stages every pending command for the next commit.
    ///
    /// Commands enqueued after this call go to the following cycle. Calling
    /// it twice before a commit appends the newer commands to the batch.
    pub fn begin_synchronize(&mut self) {
        let incoming = std::mem::take(&mut *self.pending.lock());
        if self.staged.is_empty() {
            self.staged = incoming;
        } else {
            self.staged.extend(incoming);
        }
        self.phase = Phase::Staged;
    }

    /// Applies the staged batch to `owner` in FIFO order.
    ///
    /// Must run on the owner thread. On a thread mismatch nothing is applied
    /// and the batch stays staged.
    ///
    /// Commands are not isolated from each other: a panicking command
    /// aborts the rest of the batch.
    ///
    /// Returns the number of applied commands.
    pub fn end_synchronize(&mut self, owner: &mut O, thread: ThreadId) -> Result<usize, SyncError> {
        if let Some(expected) = self.owner_thread {
            if expected != thread {
                return Err(SyncError::ThreadAffinity {
                    context: self.name,
                    expected,
                    actual: thread,
                });
            }
        }

        self.phase = Phase::Applying;
        let batch = std::mem::take(&mut self.staged);
        let applied = batch.len();
        for command in batch {
            command.run(owner);
        }
        self.phase = Phase::Idle;

        if applied > 0 {
            tracing::debug!(context = self.name, applied, "committed batch");
        }
        Ok(applied)
    }

    /// Returns true if anything is pending or staged.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.staged.is_empty() || !self.pending.lock().is_empty()
    }

    /// Number of commands waiting for the next `begin_synchronize`.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of staged commands.
    #[must_use]
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Drops every pending and staged command without applying it.
    pub fn clear(&mut self) {
        self.pending.lock().clear();
        self.staged.clear();
        self.phase = Phase::Idle;
    }
}

impl<O, P> fmt::Debug for SyncContext<O, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("pending", &self.pending_len())
            .field("staged", &self.staged.len())
            .field("owner_thread", &self.owner_thread)
            .finish()
    }
}
