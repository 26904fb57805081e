//! Key state tracking and per-transition classification.
//!
//! [`KeyStateTracker`] owns all transient capture state:
//!
//! - **held keys** – every key whose last observed transition was "down",
//! - **active modifiers** – the subset of held keys that are modifiers,
//! - **in-combo flag** – set when a modifier goes down, cleared when the
//!   last active modifier is released.
//!
//! [`KeyStateTracker::apply`] is the classification state machine: it mutates
//! the state for one raw transition and returns a [`Decision`] telling the
//! caller which event to publish and whether a repeat timer for the key must
//! be started or stopped.  The tracker never performs the side effects itself,
//! which keeps it deterministic and cheap to test.
//!
//! # Transition rules
//!
//! ```text
//! down(k), k held               → duplicate, nothing happens
//! down(k), k modifier           → held += k, modifiers += k, in_combo = true
//! down(k), modifiers active     → combo(modifiers ∪ {k}),  start repeat
//! down(k), no modifiers         → keystroke(k),            start repeat
//! up(k),   k modifier           → held -= k, modifiers -= k
//! up(k),   non-modifier         → stop repeat, held -= k,
//!                                 keystroke_up(k) unless in_combo
//! ```
//!
//! The in-combo flag is cleared whenever the modifier set becomes empty, so a
//! release that happens after every modifier was let go is reported again.

use std::collections::{BTreeSet, HashSet};

use tracing::trace;

use crate::domain::key::{Combo, KeyName};
use crate::protocol::messages::ClassifiedEvent;

/// Direction of a raw key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Down,
    Up,
}

/// What the caller must do with the repeat timer of the transitioned key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatAction {
    /// Leave repeat timers untouched.
    None,
    /// Start a repeat timer for the key.
    Start,
    /// Stop (and await) the repeat timer for the key.
    Stop,
}

/// Outcome of classifying one raw transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// `true` when the transition was a repeated "down" for an already-held key.
    pub duplicate: bool,
    /// Event to publish, if any.
    pub event: Option<ClassifiedEvent>,
    /// Repeat-timer action for the key.
    pub repeat: RepeatAction,
}

impl Decision {
    fn duplicate() -> Self {
        Self {
            duplicate: true,
            event: None,
            repeat: RepeatAction::None,
        }
    }
}

/// Held keys, active modifiers and the in-combo flag.
///
/// Invariant: `active modifiers ⊆ held keys`.
#[derive(Debug, Clone, Default)]
pub struct KeyStateTracker {
    held: HashSet<KeyName>,
    modifiers: BTreeSet<KeyName>,
    in_combo: bool,
}

impl KeyStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a key going down.
    ///
    /// Returns `false` (and changes nothing) if the key is already held.
    pub fn on_down(&mut self, key: &KeyName) -> bool {
        if !self.held.insert(key.clone()) {
            return false;
        }
        if key.is_modifier() {
            self.modifiers.insert(key.clone());
            self.in_combo = true;
        }
        true
    }

    /// Records a key going up.
    ///
    /// Returns `true` if the key was held.
    pub fn on_up(&mut self, key: &KeyName) -> bool {
        let was_held = self.held.remove(key);
        if !was_held {
            trace!(key = %key, "release of a key that was not held");
        }
        self.modifiers.remove(key);
        if self.modifiers.is_empty() {
            self.in_combo = false;
        }
        was_held
    }

    /// Applies one raw transition and classifies it.
    pub fn apply(&mut self, key: &KeyName, transition: KeyTransition) -> Decision {
        match transition {
            KeyTransition::Down => self.apply_down(key),
            KeyTransition::Up => self.apply_up(key),
        }
    }

    fn apply_down(&mut self, key: &KeyName) -> Decision {
        if !self.on_down(key) {
            return Decision::duplicate();
        }
        if key.is_modifier() {
            return Decision {
                duplicate: false,
                event: None,
                repeat: RepeatAction::None,
            };
        }

        let event = if self.modifiers.is_empty() {
            ClassifiedEvent::Keystroke { key: key.clone() }
        } else {
            ClassifiedEvent::Combo {
                keys: Combo::new(&self.modifiers, key),
            }
        };
        Decision {
            duplicate: false,
            event: Some(event),
            repeat: RepeatAction::Start,
        }
    }

    fn apply_up(&mut self, key: &KeyName) -> Decision {
        let modifier = key.is_modifier();
        self.on_up(key);

        let event = if !self.in_combo && !modifier {
            Some(ClassifiedEvent::KeystrokeUp { key: key.clone() })
        } else {
            None
        };
        Decision {
            duplicate: false,
            event,
            repeat: if modifier {
                RepeatAction::None
            } else {
                RepeatAction::Stop
            },
        }
    }

    /// Builds the event a repeat timer for `key` should emit right now.
    ///
    /// The combo is recomputed from the modifiers active at call time, not
    /// those active when the key went down.  Returns `None` once the key is no
    /// longer held.
    pub fn repeat_event(&self, key: &KeyName) -> Option<ClassifiedEvent> {
        if !self.held.contains(key) {
            return None;
        }
        Some(if self.modifiers.is_empty() {
            ClassifiedEvent::KeystrokeRepeat { key: key.clone() }
        } else {
            ClassifiedEvent::ComboRepeat {
                keys: Combo::new(&self.modifiers, key),
            }
        })
    }

    pub fn is_held(&self, key: &KeyName) -> bool {
        self.held.contains(key)
    }

    /// Returns `true` if every key in `keys` is currently held.
    pub fn all_held<'a>(&self, keys: impl IntoIterator<Item = &'a KeyName>) -> bool {
        keys.into_iter().all(|k| self.held.contains(k))
    }

    pub fn held_keys(&self) -> impl Iterator<Item = &KeyName> {
        self.held.iter()
    }

    /// Active modifiers in lexicographic order.
    pub fn active_modifiers(&self) -> impl Iterator<Item = &KeyName> {
        self.modifiers.iter()
    }

    pub fn has_active_modifiers(&self) -> bool {
        !self.modifiers.is_empty()
    }

    pub fn in_combo(&self) -> bool {
        self.in_combo
    }

    /// Forgets every held key and modifier.  Used on shutdown.
    pub fn clear(&mut self) {
        self.held.clear();
        self.modifiers.clear();
        self.in_combo = false;
    }
}
