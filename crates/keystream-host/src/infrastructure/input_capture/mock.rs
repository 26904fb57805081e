//! Scripted input source for tests.
//!
//! Lets tests inject synthetic [`RawKeyEvent`]s as if they came from the
//! keyboard hook.

use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex, PoisonError,
};

use super::{CaptureError, InputSource, RawKeyEvent};

/// An [`InputSource`] fed by hand.
#[derive(Clone, Default)]
pub struct MockInputSource {
    sender: Arc<Mutex<Option<Sender<RawKeyEvent>>>>,
}

impl MockInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects one transition.
    ///
    /// Returns `false` if the source is not started, has been stopped, or the
    /// receiver is gone.
    pub fn inject(&self, event: RawKeyEvent) -> bool {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Injects a press followed by a release of `key`.
    pub fn tap(&self, key: &str) -> bool {
        self.inject(RawKeyEvent::down(key)) && self.inject(RawKeyEvent::up(key))
    }
}

impl InputSource for MockInputSource {
    fn start(&self) -> Result<mpsc::Receiver<RawKeyEvent>, CaptureError> {
        let (tx, rx) = mpsc::channel();
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        // Dropping the sender closes the channel.
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
