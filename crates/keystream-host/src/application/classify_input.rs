//! Event classifier: turns raw key transitions into classified events.
//!
//! The classifier is the only writer of the shared key state.  It runs on the
//! dedicated capture thread, fed by the channel the OS hook writes into, so
//! the hook callback itself never waits on anything.
//!
//! For every transition it:
//!
//! 1. applies the transition to the [`KeyStateTracker`] under the write lock,
//! 2. on release, stops and joins the key's repeat timer **before** the
//!    `keystroke_up` is published,
//! 3. publishes the classified event (if any) to the event bridge,
//! 4. on press, starts the key's repeat timer and checks for the overlay
//!    toggle chord.
//!
//! The write lock is released before any repeat timer is joined; a timer
//! thread may be waiting on a read lock at that moment.

use std::sync::{mpsc, PoisonError};
use std::time::Duration;

use keystream_core::{KeyName, KeyStateTracker, KeyTransition, RepeatAction};
use tracing::{debug, info, trace};

use crate::application::bridge::EventSender;
use crate::application::overlay::OverlayToggle;
use crate::application::repeat_timers::{RepeatTimerManager, SharedKeyState};
use crate::application::shutdown::ShutdownSignal;

/// How often the capture loop wakes to look at the shutdown flag when no key
/// activity arrives.
pub const CAPTURE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One raw key transition as delivered by an input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub key: KeyName,
    pub transition: KeyTransition,
}

impl RawKeyEvent {
    pub fn down(key: impl Into<KeyName>) -> Self {
        Self {
            key: key.into(),
            transition: KeyTransition::Down,
        }
    }

    pub fn up(key: impl Into<KeyName>) -> Self {
        Self {
            key: key.into(),
            transition: KeyTransition::Up,
        }
    }
}

/// The reserved combination that toggles the overlay: `key` pressed while
/// every key in `held` is down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleChord {
    pub key: KeyName,
    pub held: Vec<KeyName>,
}

impl ToggleChord {
    pub fn new(key: impl Into<KeyName>, held: impl IntoIterator<Item = KeyName>) -> Self {
        Self {
            key: key.into(),
            held: held.into_iter().collect(),
        }
    }

    fn matches(&self, pressed: &KeyName, state: &KeyStateTracker) -> bool {
        *pressed == self.key && state.all_held(&self.held)
    }
}

impl Default for ToggleChord {
    /// ctrl + space + right.
    fn default() -> Self {
        Self::new("right", [KeyName::new("ctrl"), KeyName::new("space")])
    }
}

pub struct EventClassifier {
    state: SharedKeyState,
    repeats: RepeatTimerManager,
    events: EventSender,
    overlay: OverlayToggle,
    chord: ToggleChord,
    capture_active: bool,
}

impl EventClassifier {
    pub fn new(
        state: SharedKeyState,
        repeats: RepeatTimerManager,
        events: EventSender,
        overlay: OverlayToggle,
        chord: ToggleChord,
    ) -> Self {
        Self {
            state,
            repeats,
            events,
            overlay,
            chord,
            capture_active: true,
        }
    }

    /// Classifies one raw transition.
    pub fn handle(&mut self, raw: &RawKeyEvent) {
        let (decision, toggle) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let decision = state.apply(&raw.key, raw.transition);
            let toggle = raw.transition == KeyTransition::Down
                && !decision.duplicate
                && self.chord.matches(&raw.key, &state);
            (decision, toggle)
        };

        if decision.duplicate {
            trace!(key = %raw.key, "repeated key-down ignored");
            return;
        }

        if decision.repeat == RepeatAction::Stop {
            self.repeats.stop(&raw.key);
        }

        if let Some(event) = decision.event {
            self.events.publish(event);
        }

        if decision.repeat == RepeatAction::Start {
            self.repeats.start(&raw.key);
        }

        if toggle {
            self.toggle_overlay();
        }
    }

    fn toggle_overlay(&mut self) {
        let outcome = self.overlay.toggle();
        self.capture_active = !self.capture_active;
        info!(
            ?outcome,
            capture_active = self.capture_active,
            "overlay toggle chord pressed"
        );
    }

    /// Stops every repeat timer, clears the key state and hides the overlay.
    pub fn shutdown(&mut self) {
        self.repeats.stop_all();
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.overlay.hide();
        debug!("classifier shut down");
    }

    /// The pass-through flag flipped by the toggle chord.  Informational only.
    pub fn capture_active(&self) -> bool {
        self.capture_active
    }

    pub fn overlay_open(&self) -> bool {
        self.overlay.is_open()
    }

    pub fn active_repeats(&self) -> usize {
        self.repeats.active_count()
    }
}

/// Body of the capture thread.
///
/// Consumes raw transitions until the input source hangs up or `shutdown` is
/// raised, then shuts the classifier down.  Transitions that arrive after the
/// shutdown signal are discarded.
pub fn run_capture_loop(
    mut classifier: EventClassifier,
    raw: mpsc::Receiver<RawKeyEvent>,
    shutdown: ShutdownSignal,
) {
    info!("capture loop started");
    loop {
        if shutdown.is_triggered() {
            break;
        }
        match raw.recv_timeout(CAPTURE_POLL_INTERVAL) {
            Ok(event) => {
                if shutdown.is_triggered() {
                    break;
                }
                classifier.handle(&event);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                debug!("input source closed");
                break;
            }
        }
    }
    classifier.shutdown();
    info!("capture loop stopped");
}
