//! Application layer use cases for the host.
//!
//! Use cases in this layer orchestrate the core state machine and depend on
//! abstractions (traits) rather than concrete OS or network implementations,
//! so every piece can be exercised from unit tests with fakes.
//!
//! # Sub-modules
//!
//! - **`classify_input`** – The event classifier: consumes raw key transitions,
//!   drives the shared [`KeyStateTracker`](keystream_core::KeyStateTracker),
//!   starts/stops repeat timers and publishes classified events.  Runs on the
//!   dedicated capture thread.
//!
//! - **`repeat_timers`** – One cancellable timer thread per held non-modifier
//!   key, keyed by key name, with stop-and-join semantics.
//!
//! - **`bridge`** – The unbounded FIFO between the synchronous capture side and
//!   the asynchronous broadcaster.
//!
//! - **`broadcast`** – Drains the bridge and fans each event out to every
//!   registered observer.
//!
//! - **`observers`** – The connection registry shared with the transport.
//!
//! - **`overlay`** – The overlay toggle and its collaborator traits
//!   (screenshot grabber, presentation surface).
//!
//! - **`shutdown`** – The process-wide, idempotent shutdown signal.

pub mod bridge;
pub mod broadcast;
pub mod classify_input;
pub mod observers;
pub mod overlay;
pub mod repeat_timers;
pub mod shutdown;
