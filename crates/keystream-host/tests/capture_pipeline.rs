//! Capture pipeline integration tests.
//!
//! Drives the real capture thread, classifier, repeat timers, event bridge
//! and broadcaster from a [`MockInputSource`], with recording observers in
//! place of WebSocket connections and in-memory overlay collaborators.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_trait::async_trait;
use keystream_core::{decode_event, ClassifiedEvent, EventKind, KeyStateTracker};
use keystream_host::application::bridge::event_bridge;
use keystream_host::application::broadcast::{Broadcaster, DEFAULT_POLL_INTERVAL};
use keystream_host::application::classify_input::{
    run_capture_loop, EventClassifier, RawKeyEvent, ToggleChord,
};
use keystream_host::application::observers::{ObserverError, ObserverRegistry, ObserverSink};
use keystream_host::application::overlay::{
    OverlayError, OverlaySurface, OverlayToggle, ScreenGrabber,
};
use keystream_host::application::repeat_timers::{
    RepeatSettings, RepeatTimerManager, SharedKeyState,
};
use keystream_host::application::shutdown::ShutdownSignal;
use keystream_host::infrastructure::input_capture::mock::MockInputSource;
use keystream_host::infrastructure::input_capture::InputSource;

// ── Fakes ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    frames: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<ClassifiedEvent> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| decode_event(f).expect("broadcast frames are valid JSON"))
            .collect()
    }
}

#[async_trait]
impl ObserverSink for Recorder {
    async fn send_text(&self, text: &str) -> Result<(), ObserverError> {
        self.frames.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn label(&self) -> String {
        "recorder".into()
    }
}

/// Fails every send after the first `ok` ones.
struct Flaky {
    ok: usize,
    attempts: AtomicUsize,
}

#[async_trait]
impl ObserverSink for Flaky {
    async fn send_text(&self, _text: &str) -> Result<(), ObserverError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < self.ok {
            Ok(())
        } else {
            Err(ObserverError::Closed)
        }
    }

    fn label(&self) -> String {
        "flaky".into()
    }
}

/// Appends its label to a log shared by every observer on each send.
struct Labelled {
    label: &'static str,
    attempts: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl ObserverSink for Labelled {
    async fn send_text(&self, _text: &str) -> Result<(), ObserverError> {
        self.attempts.lock().unwrap().push(self.label);
        Ok(())
    }

    fn label(&self) -> String {
        self.label.into()
    }
}

#[derive(Clone, Default)]
struct OverlayLog(Arc<Mutex<Vec<&'static str>>>);

struct FakeGrabber(OverlayLog);

impl ScreenGrabber for FakeGrabber {
    fn grab(&mut self) -> Result<PathBuf, OverlayError> {
        self.0 .0.lock().unwrap().push("grab");
        Ok(PathBuf::from("bordered.png"))
    }
}

struct FakeSurface {
    log: OverlayLog,
    showing: bool,
}

impl OverlaySurface for FakeSurface {
    fn open(&mut self, _image: &Path) -> Result<(), OverlayError> {
        self.log.0.lock().unwrap().push("open");
        self.showing = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), OverlayError> {
        self.log.0.lock().unwrap().push("close");
        self.showing = false;
        Ok(())
    }

    fn is_showing(&mut self) -> bool {
        self.showing
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

struct Pipeline {
    source: MockInputSource,
    shutdown: ShutdownSignal,
    state: SharedKeyState,
    capture: Option<JoinHandle<()>>,
    broadcaster: Broadcaster,
    registry: ObserverRegistry,
    overlay_log: OverlayLog,
}

impl Pipeline {
    fn start(settings: RepeatSettings) -> Self {
        let source = MockInputSource::new();
        let raw = source.start().expect("mock source starts");
        let shutdown = ShutdownSignal::new();
        let registry = ObserverRegistry::new();
        let (tx, rx) = event_bridge();
        let state: SharedKeyState = Arc::new(RwLock::new(KeyStateTracker::new()));
        let overlay_log = OverlayLog::default();

        let repeats =
            RepeatTimerManager::new(settings, Arc::clone(&state), tx.clone(), shutdown.clone());
        let overlay = OverlayToggle::new(
            Box::new(FakeGrabber(overlay_log.clone())),
            Box::new(FakeSurface {
                log: overlay_log.clone(),
                showing: false,
            }),
        );
        let classifier =
            EventClassifier::new(Arc::clone(&state), repeats, tx, overlay, ToggleChord::default());
        let capture_shutdown = shutdown.clone();
        let capture = thread::spawn(move || run_capture_loop(classifier, raw, capture_shutdown));
        let broadcaster =
            Broadcaster::new(rx, registry.clone(), DEFAULT_POLL_INTERVAL, shutdown.clone());

        Self {
            source,
            shutdown,
            state,
            capture: Some(capture),
            broadcaster,
            registry,
            overlay_log,
        }
    }

    fn press(&self, key: &str) {
        assert!(self.source.inject(RawKeyEvent::down(key)));
    }

    fn release(&self, key: &str) {
        assert!(self.source.inject(RawKeyEvent::up(key)));
    }

    /// Lets the capture thread catch up with injected transitions.
    fn settle(&self) {
        thread::sleep(Duration::from_millis(50));
    }

    fn stop(&mut self) {
        self.shutdown.trigger();
        self.source.stop();
        if let Some(handle) = self.capture.take() {
            handle.join().expect("capture thread exits cleanly");
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn fast() -> RepeatSettings {
    RepeatSettings {
        initial_delay: Duration::from_millis(80),
        interval: Duration::from_millis(20),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_held_key_repeats_then_releases() {
    // Arrange
    let mut pipeline = Pipeline::start(fast());
    let recorder = Arc::new(Recorder::default());
    pipeline.registry.register(recorder.clone()).await;

    // Act
    pipeline.press("x");
    thread::sleep(Duration::from_millis(250));
    pipeline.release("x");
    pipeline.settle();
    pipeline.broadcaster.drain_once().await;

    // Assert
    let events = recorder.events();
    assert_eq!(events.first(), Some(&ClassifiedEvent::Keystroke { key: "x".into() }));
    assert_eq!(events.last(), Some(&ClassifiedEvent::KeystrokeUp { key: "x".into() }));
    let repeats = events
        .iter()
        .filter(|e| e.kind() == EventKind::KeystrokeRepeat)
        .count();
    assert!(repeats >= 1, "expected repeats, got {events:?}");
    pipeline.stop();
}

#[tokio::test]
async fn test_quick_tap_produces_no_repeat() {
    let mut pipeline = Pipeline::start(RepeatSettings {
        initial_delay: Duration::from_millis(300),
        interval: Duration::from_millis(50),
    });
    let recorder = Arc::new(Recorder::default());
    pipeline.registry.register(recorder.clone()).await;

    pipeline.press("a");
    thread::sleep(Duration::from_millis(50));
    pipeline.release("a");
    thread::sleep(Duration::from_millis(400));
    pipeline.broadcaster.drain_once().await;

    assert_eq!(
        recorder.events(),
        vec![
            ClassifiedEvent::Keystroke { key: "a".into() },
            ClassifiedEvent::KeystrokeUp { key: "a".into() },
        ]
    );
    pipeline.stop();
}

#[tokio::test]
async fn test_combo_repeat_and_swallowed_release() {
    let mut pipeline = Pipeline::start(fast());
    let recorder = Arc::new(Recorder::default());
    pipeline.registry.register(recorder.clone()).await;

    pipeline.press("shift");
    pipeline.press("ctrl");
    pipeline.press("a");
    thread::sleep(Duration::from_millis(200));
    pipeline.release("a");
    pipeline.release("ctrl");
    pipeline.release("shift");
    pipeline.settle();
    pipeline.broadcaster.drain_once().await;

    let events = recorder.events();
    let first = events.first().expect("combo emitted");
    assert_eq!(first.kind(), EventKind::Combo);
    assert_eq!(first.payload(), "a+ctrl+shift");
    assert!(events
        .iter()
        .skip(1)
        .all(|e| e.kind() == EventKind::ComboRepeat && e.payload() == "a+ctrl+shift"));
    assert!(events.len() >= 2, "expected combo repeats, got {events:?}");
    pipeline.stop();
}

#[tokio::test]
async fn test_every_observer_receives_each_event_in_order() {
    let mut pipeline = Pipeline::start(RepeatSettings {
        initial_delay: Duration::from_secs(30),
        interval: Duration::from_secs(30),
    });
    let observers: Vec<Arc<Recorder>> = (0..3).map(|_| Arc::new(Recorder::default())).collect();
    for observer in &observers {
        pipeline.registry.register(observer.clone()).await;
    }

    for key in ["h", "i"] {
        pipeline.press(key);
        pipeline.release(key);
    }
    pipeline.settle();
    let report = pipeline.broadcaster.drain_once().await;

    assert_eq!(report.events, 4);
    assert_eq!(report.delivered, 12);
    let expected = observers[0].events();
    assert_eq!(expected.len(), 4);
    for observer in &observers[1..] {
        assert_eq!(observer.events(), expected);
    }
    pipeline.stop();
}

#[tokio::test]
async fn test_send_attempts_follow_registry_order_for_each_event() {
    // Arrange
    let mut pipeline = Pipeline::start(RepeatSettings {
        initial_delay: Duration::from_secs(30),
        interval: Duration::from_secs(30),
    });
    let attempts = Arc::new(Mutex::new(Vec::new()));
    for label in ["o1", "o2", "o3"] {
        pipeline
            .registry
            .register(Arc::new(Labelled {
                label,
                attempts: Arc::clone(&attempts),
            }))
            .await;
    }

    // Act
    pipeline.press("m");
    pipeline.release("m");
    pipeline.settle();
    let report = pipeline.broadcaster.drain_once().await;

    // Assert
    assert_eq!(report.events, 2);
    assert_eq!(
        *attempts.lock().unwrap(),
        vec!["o1", "o2", "o3", "o1", "o2", "o3"]
    );
    pipeline.stop();
}

#[tokio::test]
async fn test_failing_observer_is_dropped_and_not_retried() {
    let mut pipeline = Pipeline::start(RepeatSettings {
        initial_delay: Duration::from_secs(30),
        interval: Duration::from_secs(30),
    });
    let healthy = Arc::new(Recorder::default());
    let flaky = Arc::new(Flaky {
        ok: 1,
        attempts: AtomicUsize::new(0),
    });
    pipeline.registry.register(flaky.clone()).await;
    pipeline.registry.register(healthy.clone()).await;

    pipeline.press("q");
    pipeline.release("q");
    pipeline.press("w");
    pipeline.settle();
    let report = pipeline.broadcaster.drain_once().await;

    assert_eq!(report.dropped_observers, 1);
    assert_eq!(flaky.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(healthy.events().len(), 3);
    assert_eq!(pipeline.registry.len().await, 1);
    pipeline.stop();
}

#[tokio::test]
async fn test_toggle_chord_opens_and_closes_overlay() {
    let mut pipeline = Pipeline::start(RepeatSettings {
        initial_delay: Duration::from_secs(30),
        interval: Duration::from_secs(30),
    });
    let recorder = Arc::new(Recorder::default());
    pipeline.registry.register(recorder.clone()).await;

    pipeline.press("ctrl");
    pipeline.press("space");
    pipeline.press("right");
    pipeline.release("right");
    pipeline.press("right");
    pipeline.settle();
    pipeline.broadcaster.drain_once().await;

    assert_eq!(
        *pipeline.overlay_log.0.lock().unwrap(),
        vec!["grab", "open", "close"]
    );
    assert!(
        recorder.events().iter().all(|e| e.payload() != "ctrl"),
        "ctrl never emits an event of its own"
    );
    pipeline.stop();
}

#[tokio::test]
async fn test_shutdown_with_held_keys_stops_all_activity() {
    // Arrange: three keys repeating.
    let mut pipeline = Pipeline::start(RepeatSettings {
        initial_delay: Duration::from_millis(30),
        interval: Duration::from_millis(10),
    });
    for key in ["j", "k", "l"] {
        pipeline.press(key);
    }
    thread::sleep(Duration::from_millis(120));

    // Act
    pipeline.stop();
    pipeline.broadcaster.drain_once().await;
    thread::sleep(Duration::from_millis(60));
    let after = pipeline.broadcaster.drain_once().await;

    // Assert
    assert_eq!(after.events, 0, "nothing may be emitted after shutdown");
    let state = pipeline.state.read().unwrap();
    assert_eq!(state.held_keys().count(), 0);
    assert!(!state.in_combo());
}
