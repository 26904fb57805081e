//! keystream host daemon: entry point.
//!
//! Captures the local keyboard, classifies key transitions into keystrokes,
//! combos and repeats, and streams them as JSON to every observer connected
//! over WebSocket.  Pressing ctrl+space+right shows (or hides) a fullscreen
//! bordered screenshot on the host.
//!
//! # Usage
//!
//! ```text
//! keystream-host [OPTIONS]
//!
//! Options:
//!   --config <PATH>      Config file [default: platform config dir]
//!   --bind <IP>          Observer endpoint bind address
//!   --port <PORT>        Observer endpoint port
//!   --log-level <LEVEL>  tracing filter when RUST_LOG is unset
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable              | Overrides             |
//! |-----------------------|-----------------------|
//! | `KEYSTREAM_CONFIG`    | `--config`            |
//! | `KEYSTREAM_BIND`      | `server.bind_address` |
//! | `KEYSTREAM_PORT`      | `server.port`         |
//! | `KEYSTREAM_LOG_LEVEL` | `logging.level`       |
//!
//! CLI flags win over environment variables, which win over the file.
//!
//! # Shutdown
//!
//! SIGINT or SIGTERM raises the shared shutdown signal.  The accept loop and
//! observer sessions stop, the keyboard hook is disarmed, the capture thread
//! stops and joins every repeat timer, and the broadcaster finishes its
//! current cycle.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use keystream_core::KeyStateTracker;
use keystream_host::application::bridge::event_bridge;
use keystream_host::application::broadcast::Broadcaster;
use keystream_host::application::classify_input::{run_capture_loop, EventClassifier};
use keystream_host::application::observers::ObserverRegistry;
use keystream_host::application::overlay::OverlayToggle;
use keystream_host::application::repeat_timers::{RepeatTimerManager, SharedKeyState};
use keystream_host::application::shutdown::ShutdownSignal;
use keystream_host::infrastructure::input_capture::rdev_hook::RdevInputSource;
use keystream_host::infrastructure::input_capture::InputSource;
use keystream_host::infrastructure::network::ws_server::run_server;
use keystream_host::infrastructure::overlay::{CommandScreenGrabber, ProcessSurface};
use keystream_host::infrastructure::storage::config::{load_config, AppConfig, LoggingConfig};

/// How long shutdown waits for the broadcaster's final cycle.
const BROADCASTER_GRACE: Duration = Duration::from_secs(1);

/// keystream host: keyboard capture and WebSocket event stream.
#[derive(Debug, Parser)]
#[command(
    name = "keystream-host",
    about = "Streams classified keyboard events to WebSocket observers",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "KEYSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// IP address for the observer endpoint (`0.0.0.0` for all interfaces).
    #[arg(long, env = "KEYSTREAM_BIND")]
    bind: Option<String>,

    /// TCP port for the observer endpoint.
    #[arg(long, env = "KEYSTREAM_PORT")]
    port: Option<u16>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, env = "KEYSTREAM_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    fn into_config(self) -> anyhow::Result<AppConfig> {
        let mut config = load_config(self.config.as_deref()).context("cannot load config")?;
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        Ok(config)
    }
}

/// Installs the global subscriber: stderr always, plus a log file when
/// configured.  The returned guard flushes the file writer on drop.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let (file_layer, guard) = match &logging.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let name = path
                .file_name()
                .with_context(|| format!("log file path {} has no file name", path.display()))?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("cannot create log directory {}", dir.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, name));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_thread_names(true))
        .with(file_layer)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;
    let _log_guard = init_tracing(&config.logging)?;
    let addr = config.server.socket_addr()?;

    info!(
        "keystream host starting: endpoint=ws://{addr}{}, repeat={}ms/{}ms",
        config.server.path, config.capture.initial_delay_ms, config.capture.repeat_interval_ms
    );

    let shutdown = ShutdownSignal::new();
    let registry = ObserverRegistry::new();
    let (events_tx, events_rx) = event_bridge();
    let state: SharedKeyState = Arc::new(RwLock::new(KeyStateTracker::new()));

    // ── Capture side (OS threads) ─────────────────────────────────────────────
    let source = RdevInputSource::new();
    let raw_rx = source.start().context("keyboard capture unavailable")?;

    let repeats = RepeatTimerManager::new(
        config.capture.repeat_settings(),
        Arc::clone(&state),
        events_tx.clone(),
        shutdown.clone(),
    );
    let overlay = OverlayToggle::new(
        Box::new(CommandScreenGrabber::new(
            config.overlay.capture_command.clone(),
            config.overlay.screenshot_path.clone(),
            config.overlay.border_width,
            config.overlay.border_color,
        )),
        Box::new(ProcessSurface::new(
            config.overlay.viewer_command.clone(),
            config.overlay.poll_interval(),
            config.overlay.close_timeout(),
        )),
    );
    let classifier = EventClassifier::new(
        state,
        repeats,
        events_tx,
        overlay,
        config.overlay.chord(),
    );
    let capture_shutdown = shutdown.clone();
    let capture = thread::Builder::new()
        .name("capture".to_string())
        .spawn(move || run_capture_loop(classifier, raw_rx, capture_shutdown))
        .context("cannot spawn capture thread")?;

    // ── Fan-out side (Tokio) ──────────────────────────────────────────────────
    let broadcaster = Broadcaster::new(
        events_rx,
        registry.clone(),
        config.broadcast.poll_interval(),
        shutdown.clone(),
    )
    .with_send_timeout(config.broadcast.send_timeout());
    let broadcast_task = tokio::spawn(broadcaster.run());

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_termination().await;
        if signal_shutdown.trigger() {
            info!("shutdown requested");
        }
    });

    let served = run_server(addr, config.server.path.clone(), registry, shutdown.clone()).await;

    // ── Teardown ──────────────────────────────────────────────────────────────
    shutdown.trigger();
    source.stop();
    match tokio::task::spawn_blocking(move || capture.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => error!("capture thread panicked"),
        Err(e) => error!("cannot join capture thread: {e}"),
    }
    if tokio::time::timeout(BROADCASTER_GRACE, broadcast_task)
        .await
        .is_err()
    {
        warn!("broadcaster did not stop in time");
    }

    served?;
    info!("keystream host stopped");
    Ok(())
}

/// Resolves on SIGINT, or on SIGTERM where the platform has it.
async fn wait_for_termination() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
