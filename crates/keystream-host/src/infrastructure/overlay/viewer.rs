//! Fullscreen viewer run as a separate process under a supervisor thread.
//!
//! The supervisor owns the child process.  Every poll interval it checks
//! whether the viewer exited on its own and whether a close request is
//! waiting in its one-slot channel.  On a close request it kills the viewer
//! and reaps it.  [`ProcessSurface::close`] waits a bounded time for the
//! supervisor to report back and proceeds either way.

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::expand_command;
use crate::application::overlay::{OverlayError, OverlaySurface};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

struct Supervisor {
    close_tx: SyncSender<()>,
    done_rx: Receiver<()>,
    exited: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// [`OverlaySurface`] backed by an image viewer process.
pub struct ProcessSurface {
    command: Vec<String>,
    poll_interval: Duration,
    close_timeout: Duration,
    active: Option<Supervisor>,
}

impl ProcessSurface {
    pub fn new(command: Vec<String>, poll_interval: Duration, close_timeout: Duration) -> Self {
        Self {
            command,
            poll_interval,
            close_timeout,
            active: None,
        }
    }
}

impl OverlaySurface for ProcessSurface {
    fn open(&mut self, image: &Path) -> Result<(), OverlayError> {
        if self.active.is_some() {
            self.close()?;
        }

        let (program, args) = expand_command(&self.command, image)?;
        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| OverlayError::Launch {
                program: program.clone(),
                source,
            })?;
        info!(pid = child.id(), %program, "overlay viewer started");

        let (close_tx, close_rx) = mpsc::sync_channel(1);
        let (done_tx, done_rx) = mpsc::channel();
        let exited = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&exited);
        let poll = self.poll_interval;

        let handle = thread::Builder::new()
            .name("overlay-supervisor".to_string())
            .spawn(move || {
                supervise(child, &close_rx, poll);
                flag.store(true, Ordering::SeqCst);
                let _ = done_tx.send(());
            })
            .map_err(|source| OverlayError::Launch {
                program: "overlay-supervisor".to_string(),
                source,
            })?;

        self.active = Some(Supervisor {
            close_tx,
            done_rx,
            exited,
            handle,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), OverlayError> {
        let Some(supervisor) = self.active.take() else {
            return Ok(());
        };

        if let Err(TrySendError::Disconnected(())) = supervisor.close_tx.try_send(()) {
            debug!("overlay supervisor already finished");
        }

        match supervisor.done_rx.recv_timeout(self.close_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = supervisor.handle.join();
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = self.close_timeout.as_millis() as u64,
                    "overlay viewer did not exit in time; abandoning it"
                );
                Err(OverlayError::CloseTimeout)
            }
        }
    }

    fn is_showing(&mut self) -> bool {
        match &self.active {
            Some(supervisor) => !supervisor.exited.load(Ordering::SeqCst),
            None => false,
        }
    }
}

impl Drop for ProcessSurface {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Supervisor loop: returns once the viewer is gone.
fn supervise(mut child: Child, close_rx: &Receiver<()>, poll: Duration) {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                info!(%status, "overlay viewer exited on its own");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("cannot query overlay viewer: {e}");
                return;
            }
        }

        match close_rx.recv_timeout(poll) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Err(e) = child.kill() {
                    debug!("overlay viewer kill: {e}");
                }
                let _ = child.wait();
                debug!("overlay viewer closed");
                return;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Instant;

    use super::*;

    fn surface(command: &[&str]) -> ProcessSurface {
        ProcessSurface::new(
            command.iter().map(|s| s.to_string()).collect(),
            Duration::from_millis(20),
            DEFAULT_CLOSE_TIMEOUT,
        )
    }

    #[test]
    fn test_open_then_close_stops_viewer() {
        // Arrange
        let mut surface = surface(&["sleep", "30"]);

        // Act
        surface.open(Path::new("unused.png")).unwrap();
        assert!(surface.is_showing());
        let begun = Instant::now();
        surface.close().unwrap();

        // Assert
        assert!(!surface.is_showing());
        assert!(begun.elapsed() < DEFAULT_CLOSE_TIMEOUT);
    }

    #[test]
    fn test_viewer_exiting_by_itself_is_detected() {
        let mut surface = surface(&["true"]);

        surface.open(Path::new("unused.png")).unwrap();
        thread::sleep(Duration::from_millis(300));

        assert!(!surface.is_showing());
        surface.close().unwrap();
    }

    #[test]
    fn test_close_without_open_is_ok() {
        let mut surface = surface(&["sleep", "30"]);
        assert!(surface.close().is_ok());
        assert!(!surface.is_showing());
    }

    #[test]
    fn test_missing_viewer_is_a_launch_error() {
        let mut surface = surface(&["keystream-no-such-viewer", "{path}"]);

        let err = surface.open(Path::new("shot.png")).unwrap_err();

        assert!(matches!(err, OverlayError::Launch { .. }));
        assert!(!surface.is_showing());
    }
}
