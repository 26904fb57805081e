//! Classified keyboard events as streamed to observers.
//!
//! # JSON shape
//!
//! Every event is a JSON object with an `"event"` discriminant and a `"data"`
//! object holding the payload.  Single-key kinds carry `"key"`, combo kinds
//! carry `"keys"`:
//!
//! ```json
//! {"event":"keystroke","data":{"key":"a"}}
//! {"event":"keystroke_up","data":{"key":"a"}}
//! {"event":"keystroke_repeat","data":{"key":"a"}}
//! {"event":"combo","data":{"keys":"a+ctrl+shift"}}
//! {"event":"combo_repeat","data":{"keys":"a+ctrl+shift"}}
//! ```
//!
//! Serde's adjacently-tagged representation (`tag = "event"`,
//! `content = "data"`) produces exactly this layout.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::key::{Combo, KeyName};

/// A semantically classified keyboard event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClassifiedEvent {
    /// A non-modifier key went down with no modifier active.
    Keystroke { key: KeyName },
    /// A non-modifier key was released outside of a combo.
    KeystrokeUp { key: KeyName },
    /// A plain key is still held past the initial repeat delay.
    KeystrokeRepeat { key: KeyName },
    /// A non-modifier key went down while modifiers were active.
    Combo { keys: Combo },
    /// A key is still held under modifiers past the initial repeat delay.
    ComboRepeat { keys: Combo },
}

/// The discriminant of a [`ClassifiedEvent`], without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Keystroke,
    KeystrokeUp,
    KeystrokeRepeat,
    Combo,
    ComboRepeat,
}

impl EventKind {
    /// The wire name used in the `"event"` field.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Keystroke => "keystroke",
            EventKind::KeystrokeUp => "keystroke_up",
            EventKind::KeystrokeRepeat => "keystroke_repeat",
            EventKind::Combo => "combo",
            EventKind::ComboRepeat => "combo_repeat",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ClassifiedEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClassifiedEvent::Keystroke { .. } => EventKind::Keystroke,
            ClassifiedEvent::KeystrokeUp { .. } => EventKind::KeystrokeUp,
            ClassifiedEvent::KeystrokeRepeat { .. } => EventKind::KeystrokeRepeat,
            ClassifiedEvent::Combo { .. } => EventKind::Combo,
            ClassifiedEvent::ComboRepeat { .. } => EventKind::ComboRepeat,
        }
    }

    /// The payload as text: the key name or the canonical combo string.
    pub fn payload(&self) -> &str {
        match self {
            ClassifiedEvent::Keystroke { key }
            | ClassifiedEvent::KeystrokeUp { key }
            | ClassifiedEvent::KeystrokeRepeat { key } => key.as_str(),
            ClassifiedEvent::Combo { keys } | ClassifiedEvent::ComboRepeat { keys } => {
                keys.as_str()
            }
        }
    }

    pub fn is_repeat(&self) -> bool {
        matches!(
            self,
            ClassifiedEvent::KeystrokeRepeat { .. } | ClassifiedEvent::ComboRepeat { .. }
        )
    }
}

impl fmt::Display for ClassifiedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.payload())
    }
}
