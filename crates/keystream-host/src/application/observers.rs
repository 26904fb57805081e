//! Connection registry: the set of currently connected observers.
//!
//! The transport registers an observer when a WebSocket session is
//! established and deregisters it when the session ends.  The broadcaster
//! reads the registry for every event and removes observers whose send
//! failed.  Both sides may run concurrently, so all access goes through one
//! async mutex; the lock is never held across a network send, callers work on
//! a [`snapshot`](ObserverRegistry::snapshot) instead.
//!
//! Iteration order is registration order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Identifier assigned to each registered observer.
pub type ObserverId = Uuid;

/// Error returned by an observer whose connection can no longer be written.
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("observer connection closed")]
    Closed,
    #[error("send failed: {0}")]
    Send(String),
    #[error("send did not complete within {0:?}")]
    Timeout(Duration),
}

/// Outbound half of an observer connection.
///
/// The WebSocket implementation lives in the infrastructure layer; tests use
/// recording fakes.
#[async_trait]
pub trait ObserverSink: Send + Sync {
    /// Sends one text message to the observer.
    async fn send_text(&self, text: &str) -> Result<(), ObserverError>;

    /// Human-readable label used in log messages (e.g. the peer address).
    fn label(&self) -> String;
}

/// A registered observer: its id and its sink.
#[derive(Clone)]
pub struct Observer {
    pub id: ObserverId,
    pub sink: Arc<dyn ObserverSink>,
}

/// Shared, ordered registry of live observers.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: Arc<Mutex<Vec<Observer>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer at the end of the iteration order and returns its id.
    pub async fn register(&self, sink: Arc<dyn ObserverSink>) -> ObserverId {
        let id = Uuid::new_v4();
        self.observers.lock().await.push(Observer { id, sink });
        id
    }

    /// Removes an observer.  Returns `false` if it was already gone.
    pub async fn deregister(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock().await;
        let before = observers.len();
        observers.retain(|o| o.id != id);
        observers.len() != before
    }

    /// Returns the current observers in registration order.
    pub async fn snapshot(&self) -> Vec<Observer> {
        self.observers.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.observers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.observers.lock().await.is_empty()
    }

    pub async fn contains(&self, id: ObserverId) -> bool {
        self.observers.lock().await.iter().any(|o| o.id == id)
    }
}
