//! WebP encoding through the `image` crate.
//!
//! The `image` crate ships a pure-Rust WebP encoder that only produces
//! lossless output. It runs on every target, including wasm32, which makes it
//! the default codec. The lossy tuning keys of [`EncodeOptions`] are accepted
//! and ignored.

use super::{validate_buffer, ChannelCount, CodecError, WebpCodec};
use crate::options::EncodeOptions;
use image::codecs::webp::WebPEncoder;
use image::ExtendedColorType;
use image::ImageEncoder;
use std::io::Cursor;

/// Lossless WebP codec backed by `image::codecs::webp`.
#[derive(Debug, Default)]
pub struct ImageWebpCodec {
    encoded: usize,
}

impl ImageWebpCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WebpCodec for ImageWebpCodec {
    fn encode(
        &mut self,
        buffer: &[u8],
        width: u32,
        height: u32,
        channels: ChannelCount,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>, CodecError> {
        validate_buffer(buffer, width, height, channels)?;

        if !options.is_lossless() {
            log::trace!(
                "image codec is lossless only; ignoring quality {}",
                options.quality
            );
        }

        let color_type = match channels {
            ChannelCount::Rgb => ExtendedColorType::Rgb8,
            ChannelCount::Rgba => ExtendedColorType::Rgba8,
        };

        let mut output = Cursor::new(Vec::new());

        let encoder = WebPEncoder::new_lossless(&mut output);
        encoder
            .write_image(buffer, width, height, color_type)
            .map_err(|e| CodecError::EncodingFailed(e.to_string()))?;

        self.encoded += 1;
        Ok(output.into_inner())
    }

    fn release(&mut self) {
        // The encoder holds no state between calls.
        log::trace!("releasing image codec after {} encode(s)", self.encoded);
        self.encoded = 0;
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
