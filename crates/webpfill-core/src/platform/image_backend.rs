//! Reference platform built on the `image` crate.
//!
//! Surfaces are [`RgbaImage`]s. The platform natively encodes PNG and JPEG;
//! any other media type, WebP included, is exported as PNG, which is what a
//! browser without WebP support does. This makes it a faithful stand-in for
//! such a host outside the browser.

use super::{BlobExport, DataUrlExport};
use crate::dispatch::BlobCallback;
use crate::error::ExportError;
use crate::extract::strip_alpha;
use crate::media::{EncodedBlob, JPEG, PNG};
use crate::options::normalize_quality;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use std::io::Cursor;

/// JPEG quality used when the caller gives none (the browser default, 0.92).
const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Platform whose native primitives are backed by the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct ImagePlatform {
    native_to_blob: bool,
}

impl Default for ImagePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePlatform {
    /// Platform with both URL-style and binary export.
    pub fn new() -> Self {
        Self {
            native_to_blob: true,
        }
    }

    /// Platform with URL-style export only.
    pub fn without_to_blob() -> Self {
        Self {
            native_to_blob: false,
        }
    }

    /// Encode `surface` natively. Returns the bytes and the media type that
    /// was actually produced.
    pub fn encode(
        &self,
        surface: &RgbaImage,
        media_type: Option<&str>,
        quality: Option<f64>,
    ) -> Result<(Vec<u8>, &'static str), ExportError> {
        let (width, height) = surface.dimensions();
        let mut output = Cursor::new(Vec::new());

        let produced = match media_type {
            Some(JPEG) => {
                let quality = quality
                    .and_then(normalize_quality)
                    .unwrap_or(DEFAULT_JPEG_QUALITY)
                    .clamp(1, 100);
                let rgb = strip_alpha(surface.as_raw());
                JpegEncoder::new_with_quality(&mut output, quality)
                    .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| ExportError::DataUrlExport(e.to_string()))?;
                JPEG
            }
            _ => {
                PngEncoder::new(&mut output)
                    .write_image(surface.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| ExportError::DataUrlExport(e.to_string()))?;
                PNG
            }
        };

        Ok((output.into_inner(), produced))
    }
}

impl DataUrlExport for ImagePlatform {
    type Surface = RgbaImage;

    fn create_surface(&self, width: u32, height: u32) -> Option<RgbaImage> {
        Some(RgbaImage::new(width, height))
    }

    fn to_data_url(
        &self,
        surface: &RgbaImage,
        media_type: Option<&str>,
        quality: Option<f64>,
    ) -> Result<String, ExportError> {
        let (bytes, produced) = self.encode(surface, media_type, quality)?;
        Ok(format!("data:{};base64,{}", produced, STANDARD.encode(bytes)))
    }
}

impl BlobExport for ImagePlatform {
    fn has_native_to_blob(&self) -> bool {
        self.native_to_blob
    }

    fn to_blob(
        &self,
        surface: &RgbaImage,
        on_complete: BlobCallback,
        media_type: Option<&str>,
        quality: Option<f64>,
    ) {
        match self.encode(surface, media_type, quality) {
            Ok((bytes, produced)) => on_complete(Some(EncodedBlob::new(bytes, produced))),
            Err(e) => {
                log::warn!("native export failed: {}", e);
                on_complete(None);
            }
        }
    }
}
