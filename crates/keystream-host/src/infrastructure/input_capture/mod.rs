//! Input capture infrastructure.
//!
//! The production source installs a global keyboard hook through `rdev`
//! (Win32 low-level hooks, X11 record extension or Quartz event taps) on a
//! dedicated listener thread.  The hook callback only translates the key and
//! forwards it over an `mpsc` channel; classification happens on the capture
//! thread that owns the receiving end.
//!
//! # Testability
//!
//! The [`InputSource`] trait lets tests inject synthetic transitions through
//! [`mock::MockInputSource`] without any OS hook.

use std::sync::mpsc;

pub mod mock;
pub mod rdev_hook;

pub use crate::application::classify_input::RawKeyEvent;

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to install keyboard hook: {0}")]
    HookInstallFailed(String),
    #[error("capture source has already been started")]
    AlreadyStarted,
}

/// Trait abstracting raw key transition production.
pub trait InputSource: Send {
    /// Starts the source and returns a receiver for captured transitions.
    fn start(&self) -> Result<mpsc::Receiver<RawKeyEvent>, CaptureError>;
    /// Stops delivering transitions.  Idempotent.
    fn stop(&self);
}
