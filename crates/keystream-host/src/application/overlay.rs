//! Overlay toggle: capture the screen, show it fullscreen, hide it again.
//!
//! The toggle owns two collaborators behind traits:
//!
//! - a [`ScreenGrabber`] that produces an image file (screen capture with a
//!   border already drawn), and
//! - an [`OverlaySurface`] that presents an image fullscreen and can be
//!   dismissed.
//!
//! Both are invoked from the capture thread.  Failures are reported and
//! logged but never stop capture: a broken screenshot tool only means no
//! overlay appears.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

/// Errors from the overlay collaborators.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("screen capture failed: {0}")]
    Capture(String),

    #[error("image processing failed: {0}")]
    Image(String),

    #[error("cannot launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("overlay surface did not close within the timeout")]
    CloseTimeout,

    #[error("overlay command is empty")]
    EmptyCommand,
}

/// Produces the image shown by the overlay.
#[cfg_attr(test, mockall::automock)]
pub trait ScreenGrabber: Send {
    /// Captures the screen and returns the path of the finished image.
    fn grab(&mut self) -> Result<PathBuf, OverlayError>;
}

/// Presents an image fullscreen.
#[cfg_attr(test, mockall::automock)]
pub trait OverlaySurface: Send {
    /// Shows the image at `image`.  Returns once the surface is on its way up.
    fn open(&mut self, image: &Path) -> Result<(), OverlayError>;

    /// Dismisses the surface and waits for it to be gone.
    fn close(&mut self) -> Result<(), OverlayError>;

    /// Whether the surface is still showing.  A surface the user closed by
    /// other means reports `false`.
    fn is_showing(&mut self) -> bool;
}

/// Outcome of one [`OverlayToggle::toggle`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Opened,
    Closed,
    /// The open attempt failed; the overlay stays hidden.
    Failed,
}

/// Flip-flop between "overlay hidden" and "overlay showing".
pub struct OverlayToggle {
    grabber: Box<dyn ScreenGrabber>,
    surface: Box<dyn OverlaySurface>,
    open: bool,
}

impl OverlayToggle {
    pub fn new(grabber: Box<dyn ScreenGrabber>, surface: Box<dyn OverlaySurface>) -> Self {
        Self {
            grabber,
            surface,
            open: false,
        }
    }

    /// Shows the overlay if hidden, hides it if showing.
    pub fn toggle(&mut self) -> ToggleOutcome {
        // The surface may have been closed from outside since the last toggle.
        if self.open && !self.surface.is_showing() {
            info!("overlay was closed externally");
            self.open = false;
        }

        if self.open {
            if let Err(e) = self.surface.close() {
                warn!("overlay close reported an error: {e}");
            }
            self.open = false;
            info!("overlay hidden");
            return ToggleOutcome::Closed;
        }

        match self.show() {
            Ok(()) => {
                self.open = true;
                info!("overlay shown");
                ToggleOutcome::Opened
            }
            Err(e) => {
                warn!("overlay not shown: {e}");
                ToggleOutcome::Failed
            }
        }
    }

    fn show(&mut self) -> Result<(), OverlayError> {
        let image = self.grabber.grab()?;
        self.surface.open(&image)
    }

    /// Hides the overlay if it is showing.  Used on shutdown.
    pub fn hide(&mut self) {
        if self.open {
            if let Err(e) = self.surface.close() {
                warn!("overlay close reported an error: {e}");
            }
            self.open = false;
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::function;

    use super::*;

    fn grabber_returning(path: &'static str) -> MockScreenGrabber {
        let mut grabber = MockScreenGrabber::new();
        grabber
            .expect_grab()
            .returning(move || Ok(PathBuf::from(path)));
        grabber
    }

    #[test]
    fn test_first_toggle_grabs_and_opens() {
        // Arrange
        let grabber = grabber_returning("shot.png");
        let mut surface = MockOverlaySurface::new();
        surface
            .expect_open()
            .with(function(|p: &Path| p == Path::new("shot.png")))
            .times(1)
            .returning(|_| Ok(()));
        let mut toggle = OverlayToggle::new(Box::new(grabber), Box::new(surface));

        // Act
        let outcome = toggle.toggle();

        // Assert
        assert_eq!(outcome, ToggleOutcome::Opened);
        assert!(toggle.is_open());
    }

    #[test]
    fn test_second_toggle_closes() {
        let grabber = grabber_returning("shot.png");
        let mut surface = MockOverlaySurface::new();
        surface.expect_open().times(1).returning(|_| Ok(()));
        surface.expect_is_showing().returning(|| true);
        surface.expect_close().times(1).returning(|| Ok(()));
        let mut toggle = OverlayToggle::new(Box::new(grabber), Box::new(surface));

        toggle.toggle();
        let outcome = toggle.toggle();

        assert_eq!(outcome, ToggleOutcome::Closed);
        assert!(!toggle.is_open());
    }

    #[test]
    fn test_grab_failure_leaves_overlay_hidden() {
        let mut grabber = MockScreenGrabber::new();
        grabber
            .expect_grab()
            .returning(|| Err(OverlayError::Capture("no display".into())));
        let mut surface = MockOverlaySurface::new();
        surface.expect_open().never();
        let mut toggle = OverlayToggle::new(Box::new(grabber), Box::new(surface));

        assert_eq!(toggle.toggle(), ToggleOutcome::Failed);
        assert!(!toggle.is_open());
    }

    #[test]
    fn test_close_error_still_marks_hidden() {
        let grabber = grabber_returning("shot.png");
        let mut surface = MockOverlaySurface::new();
        surface.expect_open().returning(|_| Ok(()));
        surface.expect_is_showing().returning(|| true);
        surface
            .expect_close()
            .returning(|| Err(OverlayError::CloseTimeout));
        let mut toggle = OverlayToggle::new(Box::new(grabber), Box::new(surface));

        toggle.toggle();
        assert_eq!(toggle.toggle(), ToggleOutcome::Closed);
        assert!(!toggle.is_open());
    }

    #[test]
    fn test_externally_closed_surface_reopens_on_next_toggle() {
        // Arrange: the viewer was closed by the user between toggles.
        let mut grabber = MockScreenGrabber::new();
        grabber
            .expect_grab()
            .times(2)
            .returning(|| Ok(PathBuf::from("shot.png")));
        let mut surface = MockOverlaySurface::new();
        surface.expect_open().times(2).returning(|_| Ok(()));
        surface.expect_is_showing().returning(|| false);
        surface.expect_close().never();
        let mut toggle = OverlayToggle::new(Box::new(grabber), Box::new(surface));

        // Act
        toggle.toggle();
        let outcome = toggle.toggle();

        // Assert
        assert_eq!(outcome, ToggleOutcome::Opened);
        assert!(toggle.is_open());
    }

    #[test]
    fn test_hide_is_noop_when_hidden() {
        let grabber = MockScreenGrabber::new();
        let mut surface = MockOverlaySurface::new();
        surface.expect_close().never();
        let mut toggle = OverlayToggle::new(Box::new(grabber), Box::new(surface));

        toggle.hide();

        assert!(!toggle.is_open());
    }
}
