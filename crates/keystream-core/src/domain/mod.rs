//! Domain entities for keystream.
//!
//! Pure business logic with no infrastructure dependencies: everything in
//! here can be compiled and tested on any platform without a keyboard hook,
//! a thread pool or a socket.
//!
//! Outer layers (the host's application and infrastructure modules) depend on
//! the domain; the domain never depends on them.

/// Key names, the modifier set and canonical combo strings.
pub mod key;

/// Held keys, active modifiers and the per-transition classification.
pub mod key_state;
