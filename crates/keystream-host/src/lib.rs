//! keystream-host library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # Architecture
//!
//! ```text
//! OS keyboard hook (rdev thread)
//!         │ RawKeyEvent over std mpsc
//!         ▼
//! capture thread ── EventClassifier ── KeyStateTracker (shared, RwLock)
//!         │               │                  ▲
//!         │               └─ RepeatTimerManager (one thread per held key)
//!         │                          │
//!         ▼                          ▼
//!                 EventBridge (unbounded FIFO)
//!                          │
//!                          ▼
//!              Broadcaster (Tokio task) ──► ObserverRegistry ──► WebSocket observers
//! ```

pub mod application;
pub mod infrastructure;
