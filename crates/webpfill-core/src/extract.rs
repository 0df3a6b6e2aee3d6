//! Pixel extraction from surfaces.
//!
//! Reads the full bounds of a surface through its pixel-read primitive and
//! optionally strips the alpha sample from every pixel, producing the buffer
//! that is sent to the codec.

use crate::codec::ChannelCount;
use crate::error::ExportError;
use crate::surface::RasterSurface;

/// A flat buffer of interleaved samples plus its dimensions.
///
/// Invariant: `data.len() == width * height * channels`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: ChannelCount,
}

impl PixelBuffer {
    /// True when the buffer carries an alpha sample per pixel.
    pub fn alpha_enabled(&self) -> bool {
        self.channels.has_alpha()
    }

    /// Expected byte length for the buffer's dimensions and channel count.
    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * self.channels.get()
    }
}

/// Extract the full pixel contents of `surface`.
///
/// # Arguments
/// * `surface` - The surface to read
/// * `use_alpha` - Keep the alpha sample (4 channels) or strip it (3 channels)
///
/// # Returns
/// A [`PixelBuffer`] whose length is `width * height * 4` with alpha and
/// `width * height * 3` without.
pub fn extract_pixels<S>(surface: &S, use_alpha: bool) -> Result<PixelBuffer, ExportError>
where
    S: RasterSurface + ?Sized,
{
    let width = surface.width();
    let height = surface.height();
    let rgba = surface.read_pixels(0, 0, width, height)?;

    let expected = (width as usize) * (height as usize) * 4;
    if rgba.len() != expected {
        return Err(ExportError::PixelReadMismatch {
            expected,
            actual: rgba.len(),
        });
    }

    let channels = ChannelCount::for_alpha(use_alpha);
    let data = match channels {
        ChannelCount::Rgba => rgba,
        ChannelCount::Rgb => strip_alpha(&rgba),
    };

    Ok(PixelBuffer {
        data,
        width,
        height,
        channels,
    })
}

/// Drop every 4th byte of an RGBA buffer.
pub fn strip_alpha(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for pixel in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&pixel[..3]);
    }
    rgb
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use image::RgbaImage;
    use proptest::prelude::*;

    proptest! {
        /// Property: buffer length is width * height * channels.
        #[test]
        fn prop_buffer_length(
            width in 1u32..=40,
            height in 1u32..=40,
            use_alpha in any::<bool>(),
        ) {
            let img = RgbaImage::new(width, height);
            let buffer = extract_pixels(&img, use_alpha).unwrap();

            let channels = if use_alpha { 4 } else { 3 };
            prop_assert_eq!(buffer.data.len(), (width * height) as usize * channels);
            prop_assert_eq!(buffer.data.len(), buffer.expected_len());
        }

        /// Property: stripping keeps the RGB samples in order.
        #[test]
        fn prop_strip_alpha_keeps_rgb(pixels in prop::collection::vec(any::<[u8; 4]>(), 1..64)) {
            let rgba: Vec<u8> = pixels.iter().flatten().copied().collect();
            let rgb = strip_alpha(&rgba);

            prop_assert_eq!(rgb.len(), pixels.len() * 3);
            for (i, pixel) in pixels.iter().enumerate() {
                prop_assert_eq!(&rgb[i * 3..i * 3 + 3], &pixel[..3]);
            }
        }
    }
}
