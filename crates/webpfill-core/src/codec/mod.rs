//! WebP codecs run inside execution contexts.
//!
//! The codec is an opaque collaborator: it receives a pixel buffer, its
//! dimensions, the channel count and the option map, and returns encoded
//! bytes. After every encode the owning context calls [`WebpCodec::release`]
//! to free codec-side resources.
//!
//! Codecs are created through a [`CodecFactory`], once per request, inside
//! the execution context. A factory error models a codec module that fails
//! to load.
//!
//! # Available codecs
//!
//! - [`ImageWebpCodec`] - pure Rust, lossless only (always available)
//! - `LibWebpCodec` - libwebp bindings honouring every option (`libwebp` feature)

mod image_webp;
#[cfg(feature = "libwebp")]
mod libwebp;

pub use image_webp::ImageWebpCodec;
#[cfg(feature = "libwebp")]
pub use libwebp::LibWebpCodec;

use crate::options::EncodeOptions;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur inside a codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel data length doesn't match width * height * channels
    #[error("Invalid pixel data: expected {expected} bytes ({channels} per pixel), got {actual}")]
    InvalidPixelData {
        expected: usize,
        actual: usize,
        channels: usize,
    },

    /// The codec module could not be loaded
    #[error("Codec failed to load: {0}")]
    Load(String),

    /// Encoding failed inside the codec
    #[error("WebP encoding failed: {0}")]
    EncodingFailed(String),
}

/// Number of interleaved samples per pixel in a buffer sent to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCount {
    /// RGB, alpha stripped.
    Rgb = 3,
    /// RGBA, alpha retained.
    Rgba = 4,
}

impl ChannelCount {
    /// Channel count for the given alpha setting.
    pub fn for_alpha(alpha_enabled: bool) -> Self {
        if alpha_enabled {
            ChannelCount::Rgba
        } else {
            ChannelCount::Rgb
        }
    }

    /// Samples per pixel.
    #[inline]
    pub fn get(self) -> usize {
        self as usize
    }

    /// True when an alpha sample is present.
    pub fn has_alpha(self) -> bool {
        self == ChannelCount::Rgba
    }
}

/// The codec contract.
pub trait WebpCodec: Send {
    /// Encode an interleaved pixel buffer to WebP bytes.
    fn encode(
        &mut self,
        buffer: &[u8],
        width: u32,
        height: u32,
        channels: ChannelCount,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>, CodecError>;

    /// Free codec-side resources. Called after every encode.
    fn release(&mut self);
}

/// Creates a codec instance inside an execution context.
pub type CodecFactory =
    Arc<dyn Fn() -> Result<Box<dyn WebpCodec>, CodecError> + Send + Sync + 'static>;

/// Factory for the best codec compiled into this build.
pub fn default_codec_factory() -> CodecFactory {
    #[cfg(feature = "libwebp")]
    {
        Arc::new(|| Ok(Box::new(LibWebpCodec::new()) as Box<dyn WebpCodec>))
    }
    #[cfg(not(feature = "libwebp"))]
    {
        Arc::new(|| Ok(Box::new(ImageWebpCodec::new()) as Box<dyn WebpCodec>))
    }
}

/// Check dimensions and buffer length before handing a buffer to a codec.
pub(crate) fn validate_buffer(
    buffer: &[u8],
    width: u32,
    height: u32,
    channels: ChannelCount,
) -> Result<(), CodecError> {
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidDimensions { width, height });
    }

    let expected = (width as usize) * (height as usize) * channels.get();
    if buffer.len() != expected {
        return Err(CodecError::InvalidPixelData {
            expected,
            actual: buffer.len(),
            channels: channels.get(),
        });
    }
    Ok(())
}
