//! Frame loop behavior: commit points, idle frames, failure policy and the
//! threaded runner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lumen::{
    CancellationToken, ChannelInput, Engine, EngineConfig, EngineError, FrameLoop, FrameSnapshot,
    InputEvent, NoInput, NullRender, RenderNotify, System, SystemError, CAMERA_TAG, WORLD_TAG,
};
use lumen_core::{Component, EntityComponentManager, EntityHandle, Tag};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
struct Hit {
    damage: u32,
}
impl Component for Hit {}

#[derive(Debug, Clone, PartialEq)]
struct Pos {
    x: i32,
}
impl Component for Pos {}

fn config() -> EngineConfig {
    EngineConfig {
        target_fps: 1000,
        tolerate_system_failures: false,
        publish_performance: false,
        ..EngineConfig::default()
    }
}

/// Adds a `Hit` to the target once.
struct Collision {
    target: Tag,
}

impl System for Collision {
    fn name(&self) -> &str {
        "collision"
    }

    fn execute(
        &mut self,
        _: &FrameSnapshot,
        manager: &EntityComponentManager,
    ) -> Result<(), SystemError> {
        if !manager.has::<Hit>(&self.target) {
            manager.add_component(&self.target, Hit { damage: 7 });
        }
        Ok(())
    }
}

/// Records the damage it sees on the target each frame.
struct Render {
    target: Tag,
    seen: Arc<Mutex<Vec<Option<u32>>>>,
}

impl System for Render {
    fn execute(
        &mut self,
        _: &FrameSnapshot,
        manager: &EntityComponentManager,
    ) -> Result<(), SystemError> {
        let damage = manager.try_get::<Hit>(&self.target).map(|hit| hit.damage);
        self.seen.lock().push(damage);
        Ok(())
    }
}

struct Counting {
    runs: Arc<AtomicUsize>,
}

impl System for Counting {
    fn execute(
        &mut self,
        _: &FrameSnapshot,
        _: &EntityComponentManager,
    ) -> Result<(), SystemError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Exploding;

impl System for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    fn execute(
        &mut self,
        _: &FrameSnapshot,
        _: &EntityComponentManager,
    ) -> Result<(), SystemError> {
        Err(SystemError::failed("boom"))
    }
}

#[test]
fn test_later_system_sees_earlier_request_same_frame() {
    let mut frame_loop = FrameLoop::new(config(), NoInput, NullRender).unwrap();
    let x = Tag::named("X");
    frame_loop.manager().create_entity(x.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    frame_loop
        .add_system(Collision { target: x.clone() })
        .add_system(Render {
            target: x.clone(),
            seen: Arc::clone(&seen),
        });

    let stats = frame_loop.run_frame().unwrap();

    assert_eq!(stats.systems_run, 2);
    assert_eq!(*seen.lock(), vec![Some(7)]);
    assert_eq!(
        frame_loop.manager().get_component::<Hit>(&x),
        Ok(&Hit { damage: 7 })
    );
}

#[test]
fn test_idle_frames_skip_systems() {
    let input = ChannelInput::new(16);
    let sender = input.sender();
    let mut frame_loop = FrameLoop::new(config(), input, NullRender).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    frame_loop.add_system(Counting {
        runs: Arc::clone(&runs),
    });

    // Setup commit counts as a change.
    assert!(!frame_loop.run_frame().unwrap().idle);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let idle = frame_loop.run_frame().unwrap();
    assert!(idle.idle);
    assert_eq!(idle.systems_run, 0);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // A pending request wakes the loop.
    frame_loop
        .requests()
        .create_entity(Tag::named("Late"))
        .with(Pos { x: 3 });
    assert!(!frame_loop.run_frame().unwrap().idle);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert!(frame_loop.run_frame().unwrap().idle);

    // So does input.
    assert!(sender.send(InputEvent::KeyDown(13)));
    let busy = frame_loop.run_frame().unwrap();
    assert!(!busy.idle);
    assert_eq!(busy.events_processed, 1);
    assert_eq!(runs.load(Ordering::SeqCst), 3);

    // Idle frames are still paced and counted.
    assert_eq!(frame_loop.frame_count(), 5);
    assert_eq!(frame_loop.stats().idle_frames, 2);
}

#[test]
fn test_idle_skip_can_be_disabled() {
    let config = EngineConfig {
        skip_idle_frames: false,
        ..config()
    };
    let mut frame_loop = FrameLoop::new(config, NoInput, NullRender).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    frame_loop.add_system(Counting {
        runs: Arc::clone(&runs),
    });

    for _ in 0..3 {
        assert!(!frame_loop.run_frame().unwrap().idle);
    }
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[test]
fn test_system_failure_is_fatal_when_not_tolerated() {
    let mut frame_loop = FrameLoop::new(config(), NoInput, NullRender).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    frame_loop.add_system(Exploding).add_system(Counting {
        runs: Arc::clone(&runs),
    });

    match frame_loop.run_frame() {
        Err(EngineError::SystemFailed { system, source }) => {
            assert_eq!(system, "exploding");
            assert_eq!(source, SystemError::failed("boom"));
        }
        other => panic!("expected a system failure, got {other:?}"),
    }
    // The frame was aborted before the next system.
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_system_failure_is_logged_when_tolerated() {
    let config = EngineConfig {
        tolerate_system_failures: true,
        ..config()
    };
    let mut frame_loop = FrameLoop::new(config, NoInput, NullRender).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    frame_loop.add_system(Exploding).add_system(Counting {
        runs: Arc::clone(&runs),
    });

    let stats = frame_loop.run_frame().unwrap();

    assert_eq!(stats.systems_failed, 1);
    assert_eq!(stats.systems_run, 2);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(frame_loop.stats().system_failures, 1);
}

struct RecordingSink {
    frames: Arc<Mutex<Vec<Vec<Tag>>>>,
}

impl RenderNotify for RecordingSink {
    fn notify_render(&mut self, entities: &[EntityHandle<'_>]) {
        let tags = entities.iter().map(|e| e.tag().clone()).collect();
        self.frames.lock().push(tags);
    }
}

#[test]
fn test_render_sink_receives_every_frame() {
    let frames = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink {
        frames: Arc::clone(&frames),
    };
    let mut frame_loop = FrameLoop::new(config(), NoInput, sink).unwrap();

    frame_loop.run_frame().unwrap();
    frame_loop.run_frame().unwrap();

    let frames = frames.lock();
    // Idle frames are published too.
    assert_eq!(frames.len(), 2);
    for tags in frames.iter() {
        assert_eq!(tags.len(), 2);
        assert!(tags.contains(&Tag::named(WORLD_TAG)));
        assert!(tags.contains(&Tag::named(CAMERA_TAG)));
    }
}

#[test]
fn test_render_filter_limits_published_entities() {
    let frames = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink {
        frames: Arc::clone(&frames),
    };
    let mut frame_loop = FrameLoop::new(config(), NoInput, sink).unwrap();
    frame_loop
        .manager()
        .create_entity(Tag::named("Visible"))
        .with(Pos { x: 0 });
    frame_loop
        .manager_mut()
        .set_filter(|handle| handle.has::<Pos>());

    frame_loop.run_frame().unwrap();

    assert_eq!(*frames.lock(), vec![vec![Tag::named("Visible")]]);
}

#[test]
fn test_snapshot_carries_previous_frame_time() {
    struct Timing {
        times: Arc<Mutex<Vec<Duration>>>,
    }
    impl System for Timing {
        fn execute(
            &mut self,
            snapshot: &FrameSnapshot,
            _: &EntityComponentManager,
        ) -> Result<(), SystemError> {
            self.times.lock().push(snapshot.frame_time);
            Ok(())
        }
    }

    let config = EngineConfig {
        target_fps: 200,
        skip_idle_frames: false,
        ..config()
    };
    let budget = config.frame_budget();
    let mut frame_loop = FrameLoop::new(config, NoInput, NullRender).unwrap();
    let times = Arc::new(Mutex::new(Vec::new()));
    frame_loop.add_system(Timing {
        times: Arc::clone(&times),
    });

    let first = frame_loop.run_frame().unwrap();
    frame_loop.run_frame().unwrap();

    let times = times.lock();
    assert_eq!(times[0], budget);
    assert_eq!(times[1].as_micros(), u128::from(first.total_us));
    assert!(times[1] >= budget);
}

#[test]
fn test_cancellation_checked_between_frames() {
    struct StopAfter {
        remaining: u32,
        cancel: CancellationToken,
    }
    impl System for StopAfter {
        fn execute(
            &mut self,
            _: &FrameSnapshot,
            _: &EntityComponentManager,
        ) -> Result<(), SystemError> {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.cancel.cancel();
            }
            Ok(())
        }
    }

    let config = EngineConfig {
        skip_idle_frames: false,
        ..config()
    };
    let cancel = CancellationToken::new();
    let mut frame_loop = FrameLoop::new(config, NoInput, NullRender).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    frame_loop
        .add_system(StopAfter {
            remaining: 3,
            cancel: cancel.clone(),
        })
        .add_system(Counting {
            runs: Arc::clone(&runs),
        });

    frame_loop.run_until(&cancel).unwrap();

    assert_eq!(frame_loop.frame_count(), 3);
    // The cancelling frame still ran to completion.
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

/// Cancels the loop once `frames` frames have been published.
struct StopAfterFrames {
    frames: u32,
    cancel: CancellationToken,
}

impl RenderNotify for StopAfterFrames {
    fn notify_render(&mut self, _entities: &[EntityHandle<'_>]) {
        self.frames -= 1;
        if self.frames == 0 {
            self.cancel.cancel();
        }
    }
}

#[test]
fn test_first_running_frame_is_idle_without_input_or_change() {
    let cancel = CancellationToken::new();
    let sink = StopAfterFrames {
        frames: 1,
        cancel: cancel.clone(),
    };
    let mut frame_loop = FrameLoop::new(config(), NoInput, sink).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    frame_loop.add_system(Counting {
        runs: Arc::clone(&runs),
    });
    // Committed by the start-up commit, which does not wake the loop.
    frame_loop.manager().create_entity(Tag::named("Early"));

    frame_loop.run_until(&cancel).unwrap();

    assert!(frame_loop.manager().is_live(&Tag::named("Early")));
    assert_eq!(frame_loop.frame_count(), 1);
    assert_eq!(frame_loop.stats().idle_frames, 1);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_first_running_frame_runs_with_pending_input() {
    let cancel = CancellationToken::new();
    let sink = StopAfterFrames {
        frames: 1,
        cancel: cancel.clone(),
    };
    let config = config();
    let input = ChannelInput::from_config(&config);
    assert!(input.sender().send(InputEvent::Resized {
        width: 640,
        height: 480,
    }));
    let mut frame_loop = FrameLoop::new(config, input, sink).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    frame_loop.add_system(Counting {
        runs: Arc::clone(&runs),
    });

    frame_loop.run_until(&cancel).unwrap();

    assert_eq!(frame_loop.stats().idle_frames, 0);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_engine_runs_on_named_thread() {
    struct Watcher {
        target: Tag,
        thread_name: Arc<Mutex<Option<String>>>,
        seen: Arc<AtomicUsize>,
        updated: Arc<AtomicUsize>,
    }
    impl System for Watcher {
        fn execute(
            &mut self,
            snapshot: &FrameSnapshot,
            manager: &EntityComponentManager,
        ) -> Result<(), SystemError> {
            *self.thread_name.lock() = thread::current().name().map(str::to_owned);
            match manager.try_get::<Pos>(&self.target) {
                Some(Pos { x: 99 }) => {
                    self.updated.fetch_add(1, Ordering::SeqCst);
                }
                Some(_) => {
                    self.seen.fetch_add(1, Ordering::SeqCst);
                }
                None => {}
            }
            if snapshot.input.events.contains(&InputEvent::KeyDown(1)) {
                manager.update_component(&self.target, Pos { x: 99 });
            }
            Ok(())
        }
    }

    let remote = Tag::named("Remote");
    let thread_name = Arc::new(Mutex::new(None));
    let seen = Arc::new(AtomicUsize::new(0));
    let updated = Arc::new(AtomicUsize::new(0));

    let config = config();
    let input = ChannelInput::from_config(&config);
    let keys = input.sender();
    let mut frame_loop = FrameLoop::new(config, input, NullRender).unwrap();
    frame_loop.add_system(Watcher {
        target: remote.clone(),
        thread_name: Arc::clone(&thread_name),
        seen: Arc::clone(&seen),
        updated: Arc::clone(&updated),
    });

    let handle = Engine::run(frame_loop).unwrap();

    // Requests from a producer thread other than the loop thread.
    let requests = handle.requests();
    let producer_tag = remote.clone();
    thread::spawn(move || {
        requests.create_entity(producer_tag).with(Pos { x: 1 });
    })
    .join()
    .unwrap();

    // A request committed by the start-up commit does not wake the loop,
    // so keep it busy until the watcher has seen the entity.
    let nudge = handle.requests();
    let deadline = Instant::now() + Duration::from_secs(5);
    while seen.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        nudge.create_entity(Tag::generate());
        thread::sleep(Duration::from_millis(1));
    }
    assert!(seen.load(Ordering::SeqCst) > 0, "loop never committed the request");
    assert!(keys.send(InputEvent::KeyDown(1)));

    // Input arrives on the next frame; the update is visible the frame after.
    let deadline = Instant::now() + Duration::from_secs(5);
    while updated.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(updated.load(Ordering::SeqCst) > 0, "input never reached the loop");

    assert!(!handle.is_finished());
    assert!(handle.stats().frames_recorded > 0);

    let frame_loop = handle.stop().unwrap();

    assert_eq!(thread_name.lock().as_deref(), Some("Game Loop"));
    assert!(frame_loop.manager().is_live(&remote));
    assert_eq!(
        frame_loop.manager().get_component::<Pos>(&remote),
        Ok(&Pos { x: 99 })
    );
}

#[test]
fn test_engine_reports_fatal_failure_on_stop() {
    let mut frame_loop = FrameLoop::new(config(), NoInput, NullRender).unwrap();
    frame_loop.add_system(Exploding);

    let handle = Engine::run(frame_loop).unwrap();
    let requests = handle.requests();

    // The loop idles until something changes; keep nudging it until the
    // failing frame has run.
    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() && Instant::now() < deadline {
        requests.create_entity(Tag::generate());
        thread::sleep(Duration::from_millis(1));
    }

    assert!(matches!(
        handle.stop(),
        Err(EngineError::SystemFailed { .. })
    ));
}
