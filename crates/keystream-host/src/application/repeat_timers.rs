//! Repeat timer manager: one cancellable timer thread per held key.
//!
//! While a non-modifier key is held, its timer waits an initial delay and then
//! re-emits the key on every interval: a `keystroke_repeat` when no modifier
//! is active at that tick, a `combo_repeat` built from the modifiers active at
//! that tick otherwise.
//!
//! # Lifecycle
//!
//! Timers live in a registry keyed by [`KeyName`], at most one per key.
//! [`RepeatTimerManager::stop`] raises the entry's stop flag, wakes the thread
//! and **joins** it before returning.  The classifier stops a key's timer
//! before it publishes the matching `keystroke_up`, so no repeat can ever
//! follow the release in the event stream.  At most one tick that was already
//! in flight when the key went up can slip in ahead of the release.
//!
//! Between ticks the thread blocks on a wake channel with a timeout rather
//! than sleeping, so a stop takes effect immediately instead of after the
//! remaining interval.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, RecvTimeoutError},
    Arc, PoisonError, RwLock,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use keystream_core::{KeyName, KeyStateTracker};
use tracing::{debug, error, warn};

use crate::application::bridge::EventSender;
use crate::application::shutdown::ShutdownSignal;

/// Key state shared between the capture thread (writer) and timers (readers).
pub type SharedKeyState = Arc<RwLock<KeyStateTracker>>;

/// Default delay before the first repeat.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);
/// Default interval between repeats.
pub const DEFAULT_REPEAT_INTERVAL: Duration = Duration::from_millis(100);

/// Timing of repeat emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatSettings {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl Default for RepeatSettings {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            interval: DEFAULT_REPEAT_INTERVAL,
        }
    }
}

struct RepeatEntry {
    stop: Arc<AtomicBool>,
    wake: mpsc::Sender<()>,
    handle: JoinHandle<()>,
    started_at: Instant,
}

/// Registry of running repeat timers.
pub struct RepeatTimerManager {
    entries: HashMap<KeyName, RepeatEntry>,
    settings: RepeatSettings,
    state: SharedKeyState,
    events: EventSender,
    shutdown: ShutdownSignal,
}

impl RepeatTimerManager {
    pub fn new(
        settings: RepeatSettings,
        state: SharedKeyState,
        events: EventSender,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            settings,
            state,
            events,
            shutdown,
        }
    }

    /// Starts the timer for `key`.
    ///
    /// Returns `false` if a timer for `key` is already running or the thread
    /// could not be spawned.
    pub fn start(&mut self, key: &KeyName) -> bool {
        if self.entries.contains_key(key) {
            debug!(key = %key, "repeat timer already running");
            return false;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (wake, wake_rx) = mpsc::channel();
        let worker = RepeatWorker {
            key: key.clone(),
            settings: self.settings,
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            stop: Arc::clone(&stop),
            shutdown: self.shutdown.clone(),
            wake: wake_rx,
        };

        let spawned = thread::Builder::new()
            .name(format!("repeat-{key}"))
            .spawn(move || worker.run());
        match spawned {
            Ok(handle) => {
                self.entries.insert(
                    key.clone(),
                    RepeatEntry {
                        stop,
                        wake,
                        handle,
                        started_at: Instant::now(),
                    },
                );
                true
            }
            Err(e) => {
                error!(key = %key, "failed to spawn repeat timer: {e}");
                false
            }
        }
    }

    /// Stops the timer for `key` and waits for its thread to finish.
    ///
    /// Returns `false` (with a warning) if no timer was running for `key`.
    pub fn stop(&mut self, key: &KeyName) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                retire(key, entry);
                true
            }
            None => {
                warn!(key = %key, "repeat timer not found");
                false
            }
        }
    }

    /// Stops and joins every running timer.
    pub fn stop_all(&mut self) {
        for (key, entry) in self.entries.drain() {
            retire(&key, entry);
        }
    }

    pub fn is_running(&self, key: &KeyName) -> bool {
        self.entries.contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }
}

impl Drop for RepeatTimerManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn retire(key: &KeyName, entry: RepeatEntry) {
    let RepeatEntry {
        stop,
        wake,
        handle,
        started_at,
    } = entry;
    stop.store(true, Ordering::SeqCst);
    // Dropping the sender disconnects the wake channel and ends any wait.
    drop(wake);
    if handle.join().is_err() {
        error!(key = %key, "repeat timer thread panicked");
    }
    debug!(key = %key, held_ms = started_at.elapsed().as_millis() as u64, "repeat timer retired");
}

/// State owned by one timer thread.
struct RepeatWorker {
    key: KeyName,
    settings: RepeatSettings,
    state: SharedKeyState,
    events: EventSender,
    stop: Arc<AtomicBool>,
    shutdown: ShutdownSignal,
    wake: mpsc::Receiver<()>,
}

impl RepeatWorker {
    fn run(self) {
        let mut next_tick = Instant::now() + self.settings.initial_delay;
        loop {
            if self.should_stop() {
                break;
            }

            let now = Instant::now();
            if now < next_tick {
                match self.wake.recv_timeout(next_tick - now) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            let event = self
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .repeat_event(&self.key);
            match event {
                Some(event) => {
                    if !self.events.publish(event) {
                        break;
                    }
                }
                None => break,
            }
            next_tick = Instant::now() + self.settings.interval;
        }
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
            || self.shutdown.is_triggered()
            || !self
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .is_held(&self.key)
    }
}
