//! Native export primitives of the host platform.
//!
//! A platform provides two primitives on top of its surfaces:
//!
//! - [`DataUrlExport`] - the URL-style export (`canvas.toDataURL`), always
//!   present. The capability probe and the fallback converter use it.
//! - [`BlobExport`] - the binary export (`canvas.toBlob`), which some hosts
//!   lack entirely.
//!
//! [`WebpExporter`](crate::WebpExporter) implements both traits itself, so it
//! can stand in for the platform it wraps.

mod image_backend;

pub use image_backend::ImagePlatform;

use crate::dispatch::BlobCallback;
use crate::error::ExportError;
use crate::surface::RasterSurface;

/// URL-style export primitive.
pub trait DataUrlExport {
    /// Surface type the platform draws on.
    type Surface: RasterSurface;

    /// Create a blank surface, or `None` if the platform has no drawing
    /// context to offer.
    fn create_surface(&self, width: u32, height: u32) -> Option<Self::Surface>;

    /// Export `surface` as a `data:<type>;base64,<payload>` URL.
    ///
    /// Like browsers, a platform that cannot encode `media_type` returns a PNG
    /// data URL instead.
    fn to_data_url(
        &self,
        surface: &Self::Surface,
        media_type: Option<&str>,
        quality: Option<f64>,
    ) -> Result<String, ExportError>;
}

/// Binary export primitive.
pub trait BlobExport: DataUrlExport {
    /// True if the platform has a native binary export at all.
    fn has_native_to_blob(&self) -> bool;

    /// Export `surface` and hand the result to `on_complete`.
    ///
    /// Only called when [`has_native_to_blob`](Self::has_native_to_blob)
    /// returns true.
    fn to_blob(
        &self,
        surface: &Self::Surface,
        on_complete: BlobCallback,
        media_type: Option<&str>,
        quality: Option<f64>,
    );
}
