//! Border drawing for the overlay screenshot.

use std::path::Path;

use image::{Rgb, RgbImage};

use crate::application::overlay::OverlayError;

/// Paints a solid frame `width` pixels wide along all four edges of `img`.
///
/// A width of at least half the smaller dimension fills the whole image.
pub fn draw_border(img: &mut RgbImage, width: u32, color: [u8; 3]) {
    if width == 0 {
        return;
    }
    let (w, h) = img.dimensions();
    let right = w.saturating_sub(width);
    let bottom = h.saturating_sub(width);
    let paint = Rgb(color);
    for (x, y, px) in img.enumerate_pixels_mut() {
        if x < width || y < width || x >= right || y >= bottom {
            *px = paint;
        }
    }
}

/// Loads `src`, draws the border and writes the result to `dst` as PNG.
pub fn frame_image(src: &Path, dst: &Path, width: u32, color: [u8; 3]) -> Result<(), OverlayError> {
    let mut img = image::open(src)
        .map_err(|e| OverlayError::Image(format!("cannot read {}: {e}", src.display())))?
        .to_rgb8();
    draw_border(&mut img, width, color);
    img.save_with_format(dst, image::ImageFormat::Png)
        .map_err(|e| OverlayError::Image(format!("cannot write {}: {e}", dst.display())))
}
