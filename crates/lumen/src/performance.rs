//! # Performance Counter
//!
//! Component published on the world entity after every frame when
//! `publish_performance` is on.

use std::time::Duration;

use lumen_core::Component;

/// Timing of the last completed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PerformanceComponent {
    /// Frame number.
    pub frame: u64,
    /// Frame duration, pacing included.
    pub frame_time: Duration,
    /// Frames per second implied by `frame_time`.
    pub fps: u32,
}

impl PerformanceComponent {
    /// Builds the counter for a frame.
    #[must_use]
    pub fn measure(frame: u64, frame_time: Duration) -> Self {
        let secs = frame_time.as_secs_f64();
        let fps = if secs > 0.0 {
            // Saturates; a zero-length frame reports zero.
            (1.0 / secs).min(f64::from(u32::MAX)) as u32
        } else {
            0
        };
        Self {
            frame,
            frame_time,
            fps,
        }
    }
}

impl Component for PerformanceComponent {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_from_frame_time() {
        let perf = PerformanceComponent::measure(3, Duration::from_millis(20));
        assert_eq!(perf.fps, 50);
        assert_eq!(perf.frame, 3);
        assert_eq!(PerformanceComponent::measure(0, Duration::ZERO).fps, 0);
    }
}
