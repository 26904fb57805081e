//! # keystream-core
//!
//! Shared library for keystream containing the key-state tracker, the
//! classification state machine and the JSON wire protocol spoken to
//! observers.
//!
//! This crate has zero dependencies on OS APIs, threads, or network sockets.
//! The host application (`keystream-host`) wires it to a real keyboard hook,
//! per-key repeat timers and a WebSocket server.
//!
//! # Architecture overview
//!
//! keystream watches a host keyboard and streams what the user types to any
//! number of remote observers.  Raw key transitions ("`a` went down", "`ctrl`
//! went up") are turned into semantic events before they leave the machine:
//!
//! - **`domain`** – Key names, the fixed modifier set, canonical combo strings
//!   and the [`KeyStateTracker`] that decides, for every transition, which
//!   event (if any) to emit and whether a repeat timer must start or stop.
//!
//! - **`protocol`** – The [`ClassifiedEvent`] enum and its JSON encoding,
//!   `{"event": <kind>, "data": {...}}`.

pub mod domain;
pub mod protocol;

pub use domain::key::{is_modifier, Combo, KeyName, MODIFIER_KEYS};
pub use domain::key_state::{Decision, KeyStateTracker, KeyTransition, RepeatAction};
pub use protocol::codec::{decode_event, encode_event, ProtocolError};
pub use protocol::messages::{ClassifiedEvent, EventKind};
