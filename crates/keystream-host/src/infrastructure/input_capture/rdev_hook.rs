//! Global keyboard hook backed by `rdev`.
//!
//! `rdev::listen` installs the platform hook and then blocks its thread for
//! the life of the process; there is no way to uninstall it.  Stopping the
//! source therefore disarms the callback (it drops every event) and closes
//! the channel so the capture loop sees a hang-up.
//!
//! Key names follow the lowercase, space-separated vocabulary used on the
//! wire: `"a"`, `"space"`, `"left windows"`, `"page up"`, ...  Every physical
//! key gets its own name, since held-key tracking is per key.  The left-hand
//! modifiers carry the bare names (`"ctrl"`, `"shift"`); their right-hand
//! twins are `"right ctrl"`, `"right shift"` and `"right windows"`, which are
//! not in the modifier set.  Keypad keys are prefixed with `"keypad "`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use keystream_core::{KeyName, KeyTransition};
use rdev::{listen, Event, EventType, Key};
use tracing::{debug, error, info, trace};

use super::{CaptureError, InputSource, RawKeyEvent};

/// How long `start` waits for the listener thread to report a hook failure.
/// `rdev::listen` fails fast (no display, missing permissions) or not at all.
const HOOK_STARTUP_GRACE: Duration = Duration::from_millis(250);

type SharedSender = Arc<Mutex<Option<Sender<RawKeyEvent>>>>;

/// Keyboard hook for the local machine.
pub struct RdevInputSource {
    armed: Arc<AtomicBool>,
    sender: SharedSender,
    started: AtomicBool,
}

impl RdevInputSource {
    pub fn new() -> Self {
        Self {
            armed: Arc::new(AtomicBool::new(false)),
            sender: Arc::new(Mutex::new(None)),
            started: AtomicBool::new(false),
        }
    }
}

impl Default for RdevInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for RdevInputSource {
    fn start(&self) -> Result<mpsc::Receiver<RawKeyEvent>, CaptureError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel();
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        self.armed.store(true, Ordering::SeqCst);

        let (failed_tx, failed_rx) = mpsc::channel::<String>();
        let armed = Arc::clone(&self.armed);
        let sender = Arc::clone(&self.sender);

        thread::Builder::new()
            .name("keyboard-hook".to_string())
            .spawn(move || {
                let callback = move |event: Event| forward(&armed, &sender, event);
                match listen(callback) {
                    Ok(()) => {
                        let _ = failed_tx.send("listener returned unexpectedly".to_string());
                    }
                    Err(e) => {
                        let _ = failed_tx.send(format!("{e:?}"));
                    }
                }
            })
            .map_err(|e| CaptureError::HookInstallFailed(e.to_string()))?;

        match failed_rx.recv_timeout(HOOK_STARTUP_GRACE) {
            Err(RecvTimeoutError::Timeout) => {
                info!("keyboard hook installed");
                Ok(rx)
            }
            Ok(reason) => {
                self.stop();
                error!("keyboard hook failed: {reason}");
                Err(CaptureError::HookInstallFailed(reason))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.stop();
                Err(CaptureError::HookInstallFailed(
                    "listener thread exited".to_string(),
                ))
            }
        }
    }

    fn stop(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            debug!("keyboard hook disarmed");
        }
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Hook callback body.  Translates and forwards; never blocks beyond the
/// sender lock.
fn forward(armed: &AtomicBool, sender: &SharedSender, event: Event) {
    if !armed.load(Ordering::Relaxed) {
        return;
    }
    let (key, transition) = match event.event_type {
        EventType::KeyPress(key) => (key, KeyTransition::Down),
        EventType::KeyRelease(key) => (key, KeyTransition::Up),
        _ => return,
    };
    let raw = RawKeyEvent {
        key: key_name(key),
        transition,
    };
    trace!(key = %raw.key, ?transition, "raw key");
    if let Some(tx) = sender.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
        let _ = tx.send(raw);
    }
}

/// Maps an `rdev` key to its wire name.
pub fn key_name(key: Key) -> KeyName {
    match named(key) {
        Some(name) => KeyName::new(name),
        None => match key {
            Key::Unknown(code) => KeyName::new(code.to_string()),
            other => KeyName::new(format!("{other:?}").to_lowercase()),
        },
    }
}

fn named(key: Key) -> Option<&'static str> {
    let name = match key {
        Key::Alt => "alt",
        Key::AltGr => "alt gr",
        Key::ControlLeft => "ctrl",
        Key::ControlRight => "right ctrl",
        Key::ShiftLeft => "shift",
        Key::ShiftRight => "right shift",
        Key::MetaLeft => "left windows",
        Key::MetaRight => "right windows",
        Key::Function => "fn",

        Key::Backspace => "backspace",
        Key::CapsLock => "caps lock",
        Key::Delete => "delete",
        Key::End => "end",
        Key::Escape => "esc",
        Key::Home => "home",
        Key::Insert => "insert",
        Key::PageDown => "page down",
        Key::PageUp => "page up",
        Key::Return => "enter",
        Key::Space => "space",
        Key::Tab => "tab",
        Key::PrintScreen => "print screen",
        Key::ScrollLock => "scroll lock",
        Key::Pause => "pause",
        Key::NumLock => "num lock",

        Key::UpArrow => "up",
        Key::DownArrow => "down",
        Key::LeftArrow => "left",
        Key::RightArrow => "right",

        Key::F1 => "f1",
        Key::F2 => "f2",
        Key::F3 => "f3",
        Key::F4 => "f4",
        Key::F5 => "f5",
        Key::F6 => "f6",
        Key::F7 => "f7",
        Key::F8 => "f8",
        Key::F9 => "f9",
        Key::F10 => "f10",
        Key::F11 => "f11",
        Key::F12 => "f12",

        Key::Num0 => "0",
        Key::Num1 => "1",
        Key::Num2 => "2",
        Key::Num3 => "3",
        Key::Num4 => "4",
        Key::Num5 => "5",
        Key::Num6 => "6",
        Key::Num7 => "7",
        Key::Num8 => "8",
        Key::Num9 => "9",

        Key::KeyA => "a",
        Key::KeyB => "b",
        Key::KeyC => "c",
        Key::KeyD => "d",
        Key::KeyE => "e",
        Key::KeyF => "f",
        Key::KeyG => "g",
        Key::KeyH => "h",
        Key::KeyI => "i",
        Key::KeyJ => "j",
        Key::KeyK => "k",
        Key::KeyL => "l",
        Key::KeyM => "m",
        Key::KeyN => "n",
        Key::KeyO => "o",
        Key::KeyP => "p",
        Key::KeyQ => "q",
        Key::KeyR => "r",
        Key::KeyS => "s",
        Key::KeyT => "t",
        Key::KeyU => "u",
        Key::KeyV => "v",
        Key::KeyW => "w",
        Key::KeyX => "x",
        Key::KeyY => "y",
        Key::KeyZ => "z",

        Key::BackQuote => "`",
        Key::Minus => "-",
        Key::Equal => "=",
        Key::LeftBracket => "[",
        Key::RightBracket => "]",
        Key::SemiColon => ";",
        Key::Quote => "'",
        Key::BackSlash => "\\",
        Key::IntlBackslash => "intl backslash",
        Key::Comma => ",",
        Key::Dot => ".",
        Key::Slash => "/",

        Key::Kp0 => "keypad 0",
        Key::Kp1 => "keypad 1",
        Key::Kp2 => "keypad 2",
        Key::Kp3 => "keypad 3",
        Key::Kp4 => "keypad 4",
        Key::Kp5 => "keypad 5",
        Key::Kp6 => "keypad 6",
        Key::Kp7 => "keypad 7",
        Key::Kp8 => "keypad 8",
        Key::Kp9 => "keypad 9",
        Key::KpReturn => "keypad enter",
        // `+` is the combo separator.
        Key::KpPlus => "keypad plus",
        Key::KpMinus => "keypad -",
        Key::KpMultiply => "keypad *",
        Key::KpDivide => "keypad /",
        Key::KpDelete => "keypad delete",

        _ => return None,
    };
    Some(name)
}
