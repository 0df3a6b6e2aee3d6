//! webpfill WASM - `canvas.toBlob('image/webp')` for every browser
//!
//! This crate binds webpfill-core to the browser: canvases become surfaces,
//! `toDataURL` is the URL-style export primitive, and encoding runs in a Web
//! Worker executing this same module.
//!
//! # Module Structure
//!
//! - `canvas` - Canvas surface, browser primitives, fallback conversion
//! - `install` - The `HTMLCanvasElement.prototype.toBlob` augmentation
//! - `worker` - Message protocol and the worker-side encode handler
//!
//! # Usage
//!
//! ```typescript
//! // main thread
//! import init, { install } from '@webpfill/wasm';
//!
//! await init();
//! install('/webpfill-worker.js');
//! canvas.toBlob((blob) => console.log(blob?.type), 'image/webp', 0.9);
//!
//! // webpfill-worker.js, started as a module worker
//! import init, { start_worker } from '@webpfill/wasm';
//!
//! await init();
//! start_worker();
//! ```

use wasm_bindgen::prelude::*;

mod canvas;
mod install;
mod worker;

pub use canvas::{
    canvas_to_blob_fallback, extract_canvas_pixels, has_native_webp, BrowserPlatform, CanvasSurface,
};
pub use install::{install, is_installed};
pub use worker::{encode_options, encode_worker_message, start_worker};

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
