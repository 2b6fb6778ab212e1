//! # Engine Configuration
//!
//! Loaded once at startup, from TOML or from defaults.
//!
//! ```toml
//! target_fps = 60
//! thread_name = "Game Loop"
//! tolerate_system_failures = false
//! skip_idle_frames = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the frame loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target frames per second. The frame budget is `1s / target_fps`.
    pub target_fps: u32,
    /// Name of the loop thread.
    pub thread_name: String,
    /// Keep running after a system fails (the failure is still logged).
    pub tolerate_system_failures: bool,
    /// Skip system execution when there is no input and no store change.
    pub skip_idle_frames: bool,
    /// Write a performance component onto the world entity every frame.
    pub publish_performance: bool,
    /// Warn about frames slower than `over_budget_factor` budgets.
    pub enable_timing_logs: bool,
    /// Threshold for slow-frame warnings, in frame budgets.
    pub over_budget_factor: f32,
    /// Capacity of the input event channel.
    pub input_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            thread_name: "Game Loop".to_owned(),
            tolerate_system_failures: cfg!(debug_assertions),
            skip_idle_frames: true,
            publish_performance: cfg!(debug_assertions),
            enable_timing_logs: false,
            over_budget_factor: 2.0,
            input_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid or a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_fps == 0 {
            return Err(ConfigError::Invalid("target_fps must be greater than zero".into()));
        }
        if self.thread_name.is_empty() {
            return Err(ConfigError::Invalid("thread_name must not be empty".into()));
        }
        if !(self.over_budget_factor.is_finite() && self.over_budget_factor >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "over_budget_factor must be at least 1.0, got {}",
                self.over_budget_factor
            )));
        }
        if self.input_capacity == 0 {
            return Err(ConfigError::Invalid("input_capacity must be greater than zero".into()));
        }
        Ok(())
    }

    /// Duration of one frame at the target rate.
    #[must_use]
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }

    /// Frame duration above which a slow-frame warning is logged.
    #[must_use]
    pub fn over_budget_threshold(&self) -> Duration {
        self.frame_budget().mul_f32(self.over_budget_factor)
    }
}
