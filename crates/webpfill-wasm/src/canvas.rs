//! Canvas-backed surface and the browser's native export primitives.
//!
//! # Functions
//!
//! - [`has_native_webp`] - Cached result of the WebP capability probe
//! - [`extract_canvas_pixels`] - Read a canvas as RGBA or RGB bytes
//! - [`canvas_to_blob_fallback`] - Blob export through `toDataURL`
//!
//! # Example
//!
//! ```typescript
//! import { has_native_webp, extract_canvas_pixels } from '@webpfill/wasm';
//!
//! if (!has_native_webp()) {
//!   const rgb = extract_canvas_pixels(canvas, false);
//!   console.log(`Read ${rgb.byteLength} bytes`);
//! }
//! ```

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Blob, BlobPropertyBag, CanvasRenderingContext2d, HtmlCanvasElement};
use webpfill_core::{
    convert_via_data_url, extract_pixels, process_flag, DataUrlExport, ExportError, RasterSurface,
};

/// An `HTMLCanvasElement` read through its 2D context.
#[derive(Debug, Clone)]
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
}

impl CanvasSurface {
    pub fn new(canvas: HtmlCanvasElement) -> Self {
        Self { canvas }
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    fn context(&self) -> Result<CanvasRenderingContext2d, ExportError> {
        self.canvas
            .get_context("2d")
            .ok()
            .flatten()
            .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
            .ok_or_else(|| ExportError::Unsupported("canvas has no 2d context".to_string()))
    }
}

impl RasterSurface for CanvasSurface {
    fn width(&self) -> u32 {
        self.canvas.width()
    }

    fn height(&self) -> u32 {
        self.canvas.height()
    }

    fn read_pixels(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>, ExportError> {
        let image_data = self
            .context()?
            .get_image_data(x as f64, y as f64, width as f64, height as f64)
            .map_err(|e| ExportError::PixelRead(js_error_message(&e)))?;
        Ok(image_data.data().0)
    }
}

/// The page's native canvas primitives.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserPlatform;

impl DataUrlExport for BrowserPlatform {
    type Surface = CanvasSurface;

    fn create_surface(&self, width: u32, height: u32) -> Option<CanvasSurface> {
        let canvas = web_sys::window()?
            .document()?
            .create_element("canvas")
            .ok()?
            .dyn_into::<HtmlCanvasElement>()
            .ok()?;
        canvas.set_width(width);
        canvas.set_height(height);

        let surface = CanvasSurface::new(canvas);
        surface.context().ok()?;
        Some(surface)
    }

    fn to_data_url(
        &self,
        surface: &CanvasSurface,
        media_type: Option<&str>,
        quality: Option<f64>,
    ) -> Result<String, ExportError> {
        let canvas = surface.canvas();
        let url = match (media_type, quality) {
            (None, _) => canvas.to_data_url(),
            (Some(media_type), None) => canvas.to_data_url_with_type(media_type),
            (Some(media_type), Some(quality)) => canvas
                .to_data_url_with_type_and_encoder_options(media_type, &JsValue::from_f64(quality)),
        };
        url.map_err(|e| ExportError::DataUrlExport(js_error_message(&e)))
    }
}

/// Best-effort text for a thrown JavaScript value.
pub(crate) fn js_error_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

/// Wrap `bytes` in a `Blob` of the given media type.
pub(crate) fn blob_from_bytes(bytes: &[u8], media_type: &str) -> Result<Blob, JsValue> {
    let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes));
    let options = BlobPropertyBag::new();
    options.set_type(media_type);
    Blob::new_with_u8_array_sequence_and_options(&parts, &options)
}

/// Whether this browser's `toDataURL` already produces WebP.
///
/// Detection runs once; later calls return the cached value.
#[wasm_bindgen]
pub fn has_native_webp() -> bool {
    process_flag().get_or_detect(&BrowserPlatform)
}

/// Read the full bounds of `canvas`.
///
/// # Arguments
///
/// * `canvas` - The canvas to read
/// * `use_alpha` - Keep the alpha channel (4 bytes per pixel) or drop it (3)
///
/// # Returns
///
/// A `Uint8Array` of `width * height * channels` bytes.
#[wasm_bindgen]
pub fn extract_canvas_pixels(
    canvas: &HtmlCanvasElement,
    use_alpha: bool,
) -> Result<Vec<u8>, JsValue> {
    let surface = CanvasSurface::new(canvas.clone());
    extract_pixels(&surface, use_alpha)
        .map(|buffer| buffer.data)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Export `canvas` as a `Blob` through `toDataURL`.
///
/// The blob is tagged with `media_type`, or `image/png` when none is given.
/// Used on browsers without a native `toBlob`.
#[wasm_bindgen]
pub fn canvas_to_blob_fallback(
    canvas: &HtmlCanvasElement,
    media_type: Option<String>,
    quality: Option<f64>,
) -> Result<Blob, JsValue> {
    let surface = CanvasSurface::new(canvas.clone());
    let blob = convert_via_data_url(&BrowserPlatform, &surface, media_type.as_deref(), quality)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    blob_from_bytes(blob.bytes(), blob.media_type())
}
