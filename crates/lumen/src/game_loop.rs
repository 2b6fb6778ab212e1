//! # LUMEN Frame Loop
//!
//! One frame:
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. SYNC                                                             │
//! │    ├─ Input source synchronize + snapshot                           │
//! │    └─ Commit pending requests (flyweight/component/entity triad)    │
//! │                                                                     │
//! │ 2. IDLE CHECK                                                       │
//! │    └─ No input and no store change: skip to step 5                  │
//! │                                                                     │
//! │ 3. SNAPSHOT                                                         │
//! │    └─ Frame number, frame time, input, world/camera tags            │
//! │                                                                     │
//! │ 4. SYSTEMS (registration order)                                     │
//! │    └─ execute, then frame commit so the next system sees changes    │
//! │                                                                     │
//! │ 5. END FRAME                                                        │
//! │    ├─ Sleep the rest of the frame budget                            │
//! │    ├─ Publish the performance component                             │
//! │    └─ Hand the live entities to the render sink                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`FrameLoop`] can be driven frame by frame from the calling thread
//! ([`FrameLoop::run_frame`]) or moved onto its own thread with
//! [`Engine::run`](crate::Engine::run).

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use lumen_core::{EntityComponentManager, Requests, Tag};
use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::input::InputSource;
use crate::performance::PerformanceComponent;
use crate::render::RenderNotify;
use crate::runner::CancellationToken;
use crate::system::{FrameSnapshot, System, SystemRegistry};

/// Tag of the world entity created by every loop.
pub const WORLD_TAG: &str = "World";

/// Tag of the camera entity created by every loop.
pub const CAMERA_TAG: &str = "Camera";

/// Outcome of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number.
    pub frame: u64,
    /// Work time in microseconds, pacing excluded.
    pub work_us: u64,
    /// Total frame time in microseconds, pacing included.
    pub total_us: u64,
    /// Systems executed this frame.
    pub systems_run: u32,
    /// Systems that failed this frame.
    pub systems_failed: u32,
    /// Input events processed.
    pub events_processed: u32,
    /// True if systems were skipped because nothing changed.
    pub idle: bool,
}

/// The frame loop orchestrator.
///
/// Owns the manager, the systems, the input source and the render sink.
pub struct FrameLoop {
    manager: EntityComponentManager,
    systems: SystemRegistry,
    input: Box<dyn InputSource>,
    render: Box<dyn RenderNotify>,
    config: EngineConfig,
    world: Tag,
    camera: Tag,
    /// Frame counter.
    frame_count: u64,
    /// Duration of the previous frame, pacing included.
    last_frame_time: Duration,
    /// Loop start, set by the first frame.
    started: Option<Instant>,
    /// Shared with [`EngineHandle`](crate::EngineHandle) for monitoring.
    stats_accumulator: Arc<Mutex<FrameStatsAccumulator>>,
}

impl FrameLoop {
    /// Creates a loop over a fresh manager.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: EngineConfig,
        input: impl InputSource + 'static,
        render: impl RenderNotify + 'static,
    ) -> EngineResult<Self> {
        Self::with_manager(config, EntityComponentManager::new(), input, render)
    }

    /// Creates a loop over an existing manager (e.g. one with a change
    /// notifier installed).
    ///
    /// The world entity, carrying a [`PerformanceComponent`], and the camera
    /// entity are created and committed before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the manager is
    /// bound to another thread.
    pub fn with_manager(
        config: EngineConfig,
        mut manager: EntityComponentManager,
        input: impl InputSource + 'static,
        render: impl RenderNotify + 'static,
    ) -> EngineResult<Self> {
        config.validate()?;

        let world = Tag::named(WORLD_TAG);
        let camera = Tag::named(CAMERA_TAG);
        manager
            .create_entity(world.clone())
            .with(PerformanceComponent::default());
        manager.create_entity(camera.clone());
        manager.frame_synchronize(thread::current().id())?;

        let last_frame_time = config.frame_budget();
        Ok(Self {
            manager,
            systems: SystemRegistry::new(),
            input: Box::new(input),
            render: Box::new(render),
            config,
            world,
            camera,
            frame_count: 0,
            last_frame_time,
            started: None,
            stats_accumulator: Arc::new(Mutex::new(FrameStatsAccumulator::new())),
        })
    }

    /// Appends a system; systems run in registration order.
    pub fn add_system(&mut self, system: impl System + 'static) -> &mut Self {
        self.systems.add(system);
        self
    }

    /// The registered systems.
    #[must_use]
    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    /// The manager.
    #[must_use]
    pub fn manager(&self) -> &EntityComponentManager {
        &self.manager
    }

    /// Mutable access to the manager, for setup between frames.
    pub fn manager_mut(&mut self) -> &mut EntityComponentManager {
        &mut self.manager
    }

    /// A producer handle for other threads.
    #[must_use]
    pub fn requests(&self) -> Requests {
        self.manager.requests()
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Tag of the world entity.
    #[must_use]
    pub fn world_tag(&self) -> &Tag {
        &self.world
    }

    /// Tag of the camera entity.
    #[must_use]
    pub fn camera_tag(&self) -> &Tag {
        &self.camera
    }

    /// Returns the current frame count.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Returns a copy of the accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> FrameStatsAccumulator {
        self.stats_accumulator.lock().clone()
    }

    pub(crate) fn shared_stats(&self) -> Arc<Mutex<FrameStatsAccumulator>> {
        Arc::clone(&self.stats_accumulator)
    }

    /// Runs frames on the current thread until `cancel` is set.
    ///
    /// Binds the manager to the current thread and commits pending requests
    /// first; that commit does not count as a change, so the first frame is
    /// idle unless input or a new request arrives. Cancellation is checked
    /// between frames; a frame in progress always completes.
    ///
    /// # Errors
    ///
    /// Returns the first error that stops the loop.
    pub fn run_until(&mut self, cancel: &CancellationToken) -> EngineResult<()> {
        let thread = thread::current().id();
        self.manager.bind_owner(thread);
        self.manager.synchronize(thread)?;

        tracing::info!(
            thread = %self.config.thread_name,
            target_fps = self.config.target_fps,
            systems = self.systems.len(),
            "frame loop started"
        );

        let result = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }
            if let Err(error) = self.run_frame() {
                break Err(error);
            }
        };

        tracing::info!(frames = self.frame_count, "frame loop stopped");
        result
    }

    /// Runs one frame on the current thread, pacing included.
    ///
    /// # Errors
    ///
    /// [`EngineError::SystemFailed`] when a system fails and failures are not
    /// tolerated, [`EngineError::Sync`] when called off the owner thread.
    pub fn run_frame(&mut self) -> EngineResult<FrameStats> {
        let frame_start = Instant::now();
        let started = *self.started.get_or_insert(frame_start);
        let thread = thread::current().id();

        let mut stats = FrameStats {
            frame: self.frame_count,
            ..FrameStats::default()
        };

        self.input.synchronize(thread);
        self.execute_frame(thread, frame_start.duration_since(started), &mut stats)?;

        let budget = self.config.frame_budget();
        let work = frame_start.elapsed();
        if work < budget {
            thread::sleep(budget - work);
        }
        let frame_time = frame_start.elapsed();

        if self.config.publish_performance {
            self.manager.update_component(
                &self.world,
                PerformanceComponent::measure(self.frame_count, frame_time),
            );
        }

        self.render.notify_render(&self.manager.entities());

        stats.work_us = duration_us(work);
        stats.total_us = duration_us(frame_time);
        self.end_frame(stats, frame_time);
        Ok(stats)
    }

    fn execute_frame(
        &mut self,
        thread: ThreadId,
        elapsed: Duration,
        stats: &mut FrameStats,
    ) -> EngineResult<()> {
        let changed = self.manager.has_changes();
        self.manager.synchronize(thread)?;

        let input = self.input.snapshot();
        stats.events_processed = u32::try_from(input.events.len()).unwrap_or(u32::MAX);

        if self.config.skip_idle_frames && input.is_empty() && !changed {
            tracing::debug!(frame = self.frame_count, "idle frame, systems skipped");
            stats.idle = true;
            return Ok(());
        }

        let snapshot = FrameSnapshot {
            frame: self.frame_count,
            frame_time: self.last_frame_time,
            elapsed,
            input,
            world: self.world.clone(),
            camera: self.camera.clone(),
        };

        for system in self.systems.iter_mut() {
            stats.systems_run += 1;
            match system.execute(&snapshot, &self.manager) {
                Ok(()) => self.manager.frame_synchronize(thread)?,
                Err(source) => {
                    stats.systems_failed += 1;
                    tracing::error!(system = system.name(), error = %source, "system failed");
                    if !self.config.tolerate_system_failures {
                        return Err(EngineError::SystemFailed {
                            system: system.name().to_owned(),
                            source,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn end_frame(&mut self, stats: FrameStats, frame_time: Duration) {
        self.frame_count += 1;
        self.last_frame_time = frame_time;
        self.stats_accumulator
            .lock()
            .record(stats, self.config.frame_budget());

        if self.config.enable_timing_logs && frame_time > self.config.over_budget_threshold() {
            tracing::warn!(
                frame = stats.frame,
                frame_ms = frame_time.as_secs_f64() * 1000.0,
                budget_ms = self.config.frame_budget().as_secs_f64() * 1000.0,
                "frame exceeded budget"
            );
        }
    }
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("frame_count", &self.frame_count)
            .field("systems", &self.systems)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn duration_us(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Sum of total frame times.
    pub total_us_sum: u64,
    /// Sum of work times.
    pub work_us_sum: u64,
    /// Min frame time.
    pub min_frame_us: u64,
    /// Max frame time.
    pub max_frame_us: u64,
    /// Frames that exceeded budget.
    pub frames_over_budget: u64,
    /// Frames whose systems were skipped.
    pub idle_frames: u64,
    /// System failures across all frames.
    pub system_failures: u64,
}

impl FrameStatsAccumulator {
    /// Creates a new accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames_recorded: 0,
            total_us_sum: 0,
            work_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            idle_frames: 0,
            system_failures: 0,
        }
    }

    /// Records a frame's statistics against a frame budget.
    pub fn record(&mut self, stats: FrameStats, budget: Duration) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.work_us_sum += stats.work_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        self.system_failures += u64::from(stats.systems_failed);

        if stats.idle {
            self.idle_frames += 1;
        }
        if stats.work_us > duration_us(budget) {
            self.frames_over_budget += 1;
        }
    }

    /// Returns average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Returns average FPS.
    #[must_use]
    pub fn avg_fps(&self) -> f64 {
        let avg_ms = self.avg_frame_ms();
        if avg_ms <= 0.0 {
            return 0.0;
        }
        1000.0 / avg_ms
    }

    /// Returns the fraction of frames over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::NoInput;
    use crate::render::NullRender;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            target_fps: 1000,
            publish_performance: false,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_loop_creates_world_and_camera() {
        let frame_loop = FrameLoop::new(fast_config(), NoInput, NullRender).unwrap();
        let ecm = frame_loop.manager();

        assert!(ecm.is_live(frame_loop.world_tag()));
        assert!(ecm.is_live(frame_loop.camera_tag()));
        assert!(ecm.has::<PerformanceComponent>(frame_loop.world_tag()));
        assert_eq!(frame_loop.frame_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            target_fps: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            FrameLoop::new(config, NoInput, NullRender),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_frame_cycle_counts_frames() {
        let mut frame_loop = FrameLoop::new(fast_config(), NoInput, NullRender).unwrap();

        let first = frame_loop.run_frame().unwrap();
        assert_eq!(first.frame, 0);
        // The setup commit is still latched as a change.
        assert!(!first.idle);

        let second = frame_loop.run_frame().unwrap();
        assert!(second.idle);
        assert_eq!(frame_loop.frame_count(), 2);
        assert_eq!(frame_loop.stats().idle_frames, 1);
    }

    #[test]
    fn test_performance_is_published() {
        let config = EngineConfig {
            publish_performance: true,
            ..fast_config()
        };
        let mut frame_loop = FrameLoop::new(config, NoInput, NullRender).unwrap();
        frame_loop.run_frame().unwrap();
        frame_loop.run_frame().unwrap();

        let world = frame_loop.world_tag().clone();
        let perf = frame_loop
            .manager()
            .get_component::<PerformanceComponent>(&world)
            .unwrap();
        assert_eq!(perf.frame, 0);
        assert!(perf.frame_time >= Duration::from_millis(1));
    }

    #[test]
    fn test_stats_accumulator() {
        let mut acc = FrameStatsAccumulator::new();
        let budget = Duration::from_micros(16_666);

        for i in 0..100 {
            acc.record(
                FrameStats {
                    frame: i,
                    work_us: if i < 10 { 20_000 } else { 5_000 },
                    total_us: 10_000 + (i * 100),
                    idle: i % 2 == 0,
                    ..FrameStats::default()
                },
                budget,
            );
        }

        assert_eq!(acc.frames_recorded, 100);
        assert_eq!(acc.frames_over_budget, 10);
        assert_eq!(acc.idle_frames, 50);
        assert_eq!(acc.min_frame_us, 10_000);
        assert!(acc.avg_fps() > 50.0);
        assert!(acc.avg_fps() < 100.0);
    }
}
