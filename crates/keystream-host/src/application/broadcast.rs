//! Broadcaster: drains the event bridge and fans events out to observers.
//!
//! Runs as a single recurring Tokio task.  Each cycle it takes every event
//! currently queued (FIFO), encodes each one once, and sends the text to every
//! registered observer in registry order.  An observer whose send fails is
//! removed from the registry on the spot, so the next event never retries a
//! dead connection.  A send still pending after the send timeout counts as a
//! failure: a peer that stops reading cannot hold up the others.  After a
//! cycle the task sleeps for the poll interval so an idle host does not spin.
//!
//! Sends to one observer are awaited in order, which keeps each observer's
//! stream in enqueue order.  Nothing orders one observer relative to another.

use std::time::Duration;

use keystream_core::{encode_event, ClassifiedEvent};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::bridge::EventReceiver;
use crate::application::observers::{ObserverError, ObserverRegistry};
use crate::application::shutdown::ShutdownSignal;

/// Default pause between drain cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bound on a single send to a single observer.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-cycle delivery counts, returned by [`Broadcaster::drain_once`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Events taken from the bridge.
    pub events: usize,
    /// Successful sends across all observers.
    pub delivered: usize,
    /// Observers removed after a failed send.
    pub dropped_observers: usize,
}

pub struct Broadcaster {
    events: EventReceiver,
    registry: ObserverRegistry,
    poll_interval: Duration,
    send_timeout: Duration,
    shutdown: ShutdownSignal,
}

impl Broadcaster {
    pub fn new(
        events: EventReceiver,
        registry: ObserverRegistry,
        poll_interval: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            events,
            registry,
            poll_interval,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            shutdown,
        }
    }

    /// Replaces the per-send timeout.
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Runs drain cycles until the shutdown signal is raised.
    pub async fn run(mut self) {
        info!(poll_ms = self.poll_interval.as_millis() as u64, "broadcaster started");
        while !self.shutdown.is_triggered() {
            self.drain_once().await;
            tokio::time::sleep(self.poll_interval).await;
        }
        info!("broadcaster stopped");
    }

    /// Performs one drain cycle.
    pub async fn drain_once(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        for event in self.events.drain() {
            report.events += 1;
            let (delivered, dropped) = self.fan_out(&event).await;
            report.delivered += delivered;
            report.dropped_observers += dropped;
        }
        report
    }

    async fn fan_out(&self, event: &ClassifiedEvent) -> (usize, usize) {
        let text = match encode_event(event) {
            Ok(text) => text,
            Err(e) => {
                error!(%event, "cannot encode event: {e}");
                return (0, 0);
            }
        };
        debug!(%event, "broadcasting");

        let mut delivered = 0;
        let mut dropped = 0;
        for observer in self.registry.snapshot().await {
            let sent = match timeout(self.send_timeout, observer.sink.send_text(&text)).await {
                Ok(result) => result,
                Err(_) => Err(ObserverError::Timeout(self.send_timeout)),
            };
            match sent {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(observer = %observer.sink.label(), "send failed, removing observer: {e}");
                    if self.registry.deregister(observer.id).await {
                        dropped += 1;
                    }
                }
            }
        }
        (delivered, dropped)
    }
}
