//! Overlay adapters: external screenshot tool, border drawing, fullscreen
//! viewer process.
//!
//! Both external programs are configured as argument vectors in which the
//! placeholder `{path}` stands for the image file.

use std::path::Path;

use crate::application::overlay::OverlayError;

pub mod border;
pub mod screenshot;
pub mod viewer;

pub use screenshot::CommandScreenGrabber;
pub use viewer::ProcessSurface;

/// Placeholder replaced by the image path in command templates.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Splits a command template into program and arguments, substituting
/// [`PATH_PLACEHOLDER`] with `path`.
pub(crate) fn expand_command(
    template: &[String],
    path: &Path,
) -> Result<(String, Vec<String>), OverlayError> {
    let (program, args) = template.split_first().ok_or(OverlayError::EmptyCommand)?;
    let path = path.to_string_lossy();
    let args = args
        .iter()
        .map(|arg| arg.replace(PATH_PLACEHOLDER, &path))
        .collect();
    Ok((program.clone(), args))
}
