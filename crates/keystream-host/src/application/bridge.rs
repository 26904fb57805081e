//! Event bridge: the FIFO between the capture side and the broadcaster.
//!
//! The classifier and the repeat timers run on plain OS threads; the
//! broadcaster runs on the Tokio runtime.  An unbounded Tokio channel joins
//! the two: `send` never blocks and never awaits, so the capture thread is
//! never stalled by a slow observer, and the receiver can be drained without
//! awaiting.
//!
//! Events from one sender arrive in the order they were published.

use keystream_core::ClassifiedEvent;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, warn};

/// Creates a connected sender/receiver pair.
pub fn event_bridge() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Producer half, cloned into the classifier and every repeat timer.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<ClassifiedEvent>,
}

impl EventSender {
    /// Enqueues an event without blocking.
    ///
    /// Returns `false` if the broadcaster has gone away (shutdown).
    pub fn publish(&self, event: ClassifiedEvent) -> bool {
        debug!(%event, "enqueued");
        match self.tx.send(event) {
            Ok(()) => true,
            Err(err) => {
                warn!(event = %err.0, "event bridge closed; dropping event");
                false
            }
        }
    }
}

/// Consumer half, owned by the broadcaster.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<ClassifiedEvent>,
}

impl EventReceiver {
    /// Takes every event currently queued, in FIFO order.
    pub fn drain(&mut self) -> Vec<ClassifiedEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }
}
