//! Drawable surfaces the pipeline reads pixels from.

use crate::error::ExportError;
use image::RgbaImage;

/// A rectangular pixel grid owned by the caller.
///
/// The pipeline only ever reads from a surface. `read_pixels` is the native
/// pixel-read primitive: it returns RGBA8 samples in row-major order, four
/// bytes per pixel, for the requested rectangle.
pub trait RasterSurface {
    /// Surface width in pixels.
    fn width(&self) -> u32;

    /// Surface height in pixels.
    fn height(&self) -> u32;

    /// Read a `width` x `height` rectangle starting at (`x`, `y`).
    fn read_pixels(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>, ExportError>;
}

impl RasterSurface for RgbaImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn read_pixels(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>, ExportError> {
        let (img_width, img_height) = self.dimensions();
        let in_bounds = x.checked_add(width).is_some_and(|right| right <= img_width)
            && y.checked_add(height).is_some_and(|bottom| bottom <= img_height);
        if !in_bounds {
            return Err(ExportError::PixelRead(format!(
                "rectangle {}x{} at ({}, {}) exceeds {}x{} surface",
                width, height, x, y, img_width, img_height
            )));
        }

        if x == 0 && y == 0 && width == img_width && height == img_height {
            return Ok(self.as_raw().clone());
        }

        Ok(image::imageops::crop_imm(self, x, y, width, height)
            .to_image()
            .into_raw())
    }
}
