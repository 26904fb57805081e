//! WebSocket server: accept loop and per-observer sessions.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Upgrading each connection to a WebSocket session, refusing any request
//!    whose path is not the configured endpoint with `404 Not Found`.
//! 3. Registering the session's outbound half in the [`ObserverRegistry`] so
//!    the broadcaster can reach it.
//! 4. Reading inbound frames and echoing every text message back as
//!    `Message received: <text>`.
//! 5. Deregistering the observer when the session ends for any reason.
//!
//! Each session runs in its own Tokio task.  The accept loop and each session
//! wake at least every 200 ms to check the shutdown signal.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::application::observers::{ObserverError, ObserverRegistry, ObserverSink};
use crate::application::shutdown::ShutdownSignal;

/// Upper bound on how long the accept loop and sessions wait before
/// re-checking the shutdown signal.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Prefix of the reply sent for every inbound text message.
pub const ECHO_PREFIX: &str = "Message received: ";

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

/// Binds `addr` and serves observers until `shutdown` is raised.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound.
pub async fn run_server(
    addr: SocketAddr,
    path: String,
    registry: ObserverRegistry,
    shutdown: ShutdownSignal,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {addr}"))?;
    serve(listener, path, registry, shutdown).await
}

/// Runs the accept loop on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    path: String,
    registry: ObserverRegistry,
    shutdown: ShutdownSignal,
) -> anyhow::Result<()> {
    let local = listener
        .local_addr()
        .context("listener has no local address")?;
    info!("observer endpoint listening on ws://{local}{path}");
    let path: Arc<str> = Arc::from(path);

    loop {
        if shutdown.is_triggered() {
            info!("shutdown requested; stopping accept loop");
            break;
        }

        match timeout(SHUTDOWN_POLL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                debug!("tcp connection from {peer}");
                let path = Arc::clone(&path);
                let registry = registry.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    handle_session(stream, peer, path, registry, shutdown).await;
                });
            }
            Ok(Err(e)) => {
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

/// Outbound half of one observer connection.
pub struct WsObserver {
    peer: SocketAddr,
    sink: Mutex<WsSink>,
}

#[async_trait]
impl ObserverSink for WsObserver {
    async fn send_text(&self, text: &str) -> Result<(), ObserverError> {
        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Text(text.to_string()))
            .await
            .map_err(|e| match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => ObserverError::Closed,
                other => ObserverError::Send(other.to_string()),
            })
    }

    fn label(&self) -> String {
        self.peer.to_string()
    }
}

impl WsObserver {
    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(WsMessage::Close(None)).await {
            debug!("observer {}: close frame not sent: {e}", self.peer);
        }
    }
}

async fn handle_session(
    stream: TcpStream,
    peer: SocketAddr,
    path: Arc<str>,
    registry: ObserverRegistry,
    shutdown: ShutdownSignal,
) {
    match run_session(stream, peer, path, registry, shutdown).await {
        Ok(()) => info!("observer {peer} disconnected"),
        Err(e) => warn!("observer {peer} closed with error: {e:#}"),
    }
}

async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    path: Arc<str>,
    registry: ObserverRegistry,
    shutdown: ShutdownSignal,
) -> anyhow::Result<()> {
    let ws = accept_hdr_async(stream, |req: &Request, resp: Response| {
        check_path(req, resp, &path)
    })
    .await
    .with_context(|| format!("WebSocket handshake failed with {peer}"))?;

    let (ws_tx, mut ws_rx) = ws.split();
    let observer = Arc::new(WsObserver {
        peer,
        sink: Mutex::new(ws_tx),
    });
    let id = registry.register(observer.clone()).await;
    info!("observer {peer} connected ({} total)", registry.len().await);

    let outcome = read_loop(&observer, &mut ws_rx, &shutdown).await;

    registry.deregister(id).await;
    if shutdown.is_triggered() {
        observer.close().await;
    }
    outcome
}

async fn read_loop(
    observer: &WsObserver,
    ws_rx: &mut futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
    shutdown: &ShutdownSignal,
) -> anyhow::Result<()> {
    let peer = observer.peer;
    loop {
        if shutdown.is_triggered() {
            return Ok(());
        }
        let frame = match timeout(SHUTDOWN_POLL, ws_rx.next()).await {
            Err(_) => continue,
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(WsError::ConnectionClosed | WsError::Protocol(_)))) | Ok(None) => {
                debug!("observer {peer}: stream ended");
                return Ok(());
            }
            Ok(Some(Err(e))) => return Err(e.into()),
        };

        match frame {
            WsMessage::Text(text) => {
                debug!("observer {peer}: inbound text ({} bytes)", text.len());
                observer
                    .send_text(&format!("{ECHO_PREFIX}{text}"))
                    .await
                    .with_context(|| format!("echo to {peer} failed"))?;
            }
            WsMessage::Binary(data) => {
                debug!("observer {peer}: binary frame ignored ({} bytes)", data.len());
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            WsMessage::Close(_) => {
                debug!("observer {peer}: close frame received");
                return Ok(());
            }
            WsMessage::Frame(_) => {}
        }
    }
}

/// Handshake callback: accepts only requests for the observer endpoint.
fn check_path(req: &Request, resp: Response, expected: &str) -> Result<Response, ErrorResponse> {
    if req.uri().path() == expected {
        return Ok(resp);
    }
    debug!("rejecting handshake for path {}", req.uri().path());
    let mut refusal = ErrorResponse::new(Some("Not Found".to_string()));
    *refusal.status_mut() = StatusCode::NOT_FOUND;
    Err(refusal)
}
