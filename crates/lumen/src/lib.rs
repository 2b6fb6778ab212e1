//! # LUMEN Frame Loop
//!
//! Fixed-rate loop that drives a [`lumen_core`] store: commits pending
//! requests, runs systems in order, paces the frame and hands the live
//! entity set to the renderer.
//!
//! ## Architecture Rules
//!
//! 1. **Single committer** - only the loop thread applies requests
//! 2. **Commit between systems** - a system sees what earlier systems requested
//! 3. **Idle frames are cheap** - no input and no change means no system runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use lumen::{ChannelInput, Engine, EngineConfig, FrameLoop, NullRender};
//!
//! let config = EngineConfig::load("lumen.toml")?;
//! let input = ChannelInput::from_config(&config);
//! let keys = input.sender();
//! let mut frame_loop = FrameLoop::new(config, input, NullRender)?;
//! frame_loop.add_system(Physics::default());
//!
//! let handle = Engine::run(frame_loop)?;
//! handle.requests().create_entity(Tag::named("Player")).with(Position::default());
//! let frame_loop = handle.stop()?;
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod game_loop;
pub mod input;
pub mod performance;
pub mod render;
pub mod runner;
pub mod system;

pub use config::EngineConfig;
pub use error::{ConfigError, EngineError, EngineResult, SystemError};
pub use game_loop::{FrameLoop, FrameStats, FrameStatsAccumulator, CAMERA_TAG, WORLD_TAG};
pub use input::{ChannelInput, InputEvent, InputSender, InputSnapshot, InputSource, NoInput};
pub use performance::PerformanceComponent;
pub use render::{NullRender, RenderNotify};
pub use runner::{CancellationToken, Engine, EngineHandle};
pub use system::{FrameSnapshot, System, SystemRegistry};
