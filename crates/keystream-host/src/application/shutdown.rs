//! Process-wide shutdown signal.
//!
//! A single atomic flag shared by the hook callback, the capture thread, every
//! repeat timer, the broadcaster and the WebSocket accept loop.  Triggering it
//! is a lone atomic swap: no allocation, no lock, no blocking, so it can be
//! called from a signal-handling context and any number of times.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cloneable handle to the shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown.
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    pub fn trigger(&self) -> bool {
        !self.triggered.swap(true, Ordering::SeqCst)
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}
