//! Screen capture through an external screenshot program.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use super::border::frame_image;
use super::expand_command;
use crate::application::overlay::{OverlayError, ScreenGrabber};

/// Runs a screenshot command, then frames the capture with a border.
///
/// The raw capture is written next to the output file with a `.raw.png`
/// suffix and removed once the bordered image exists.
pub struct CommandScreenGrabber {
    command: Vec<String>,
    output: PathBuf,
    border_width: u32,
    border_color: [u8; 3],
}

impl CommandScreenGrabber {
    pub fn new(
        command: Vec<String>,
        output: impl Into<PathBuf>,
        border_width: u32,
        border_color: [u8; 3],
    ) -> Self {
        Self {
            command,
            output: output.into(),
            border_width,
            border_color,
        }
    }

    fn raw_path(&self) -> PathBuf {
        self.output.with_extension("raw.png")
    }

    fn capture_to(&self, raw: &Path) -> Result<(), OverlayError> {
        let (program, args) = expand_command(&self.command, raw)?;
        debug!(%program, ?args, "running screenshot command");
        let out = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| OverlayError::Launch {
                program: program.clone(),
                source,
            })?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(OverlayError::Capture(format!(
                "`{program}` exited with {}: {}",
                out.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl ScreenGrabber for CommandScreenGrabber {
    fn grab(&mut self) -> Result<PathBuf, OverlayError> {
        let raw = self.raw_path();
        self.capture_to(&raw)?;
        let framed = frame_image(&raw, &self.output, self.border_width, self.border_color);
        let _ = std::fs::remove_file(&raw);
        framed?;
        debug!(path = %self.output.display(), "bordered screenshot written");
        Ok(self.output.clone())
    }
}
