//! # Engine Error Types
//!
//! All errors that can occur while configuring or running the frame loop.

use std::io;

use lumen_core::{StoreError, SyncError};
use thiserror::Error;

/// Failure reported by a system's `execute`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    /// The system gave up on this frame.
    #[error("{0}")]
    Failed(String),

    /// A typed store read failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SystemError {
    /// Shorthand for [`SystemError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] io::Error),

    /// The configuration is not valid TOML for [`EngineConfig`](crate::EngineConfig).
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that stop the frame loop.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A system failed and failures are not tolerated.
    #[error("system `{system}` failed: {source}")]
    SystemFailed {
        /// Name of the failing system.
        system: String,
        /// The failure.
        #[source]
        source: SystemError,
    },

    /// A commit was attempted from the wrong thread.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The loop thread could not be spawned.
    #[error("failed to spawn loop thread: {0}")]
    Spawn(#[source] io::Error),

    /// The loop thread panicked.
    #[error("loop thread panicked")]
    LoopPanicked,
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
