//! Worker message protocol, both sides.
//!
//! The page posts one message per encode:
//!
//! ```typescript
//! { options: EncodeOptions, data: Uint8Array, width: number, height: number, useAlpha: boolean }
//! ```
//!
//! and the worker answers with one `Blob` of type `image/webp`, or `null` if
//! the codec failed.
//!
//! # Worker script
//!
//! `install` spawns this script with `{ type: "module" }`.
//!
//! ```typescript
//! import init, { start_worker } from '@webpfill/wasm';
//!
//! await init();
//! start_worker();
//! ```

use crate::canvas::blob_from_bytes;
use js_sys::{Object, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Blob, DedicatedWorkerGlobalScope, MessageEvent};
use webpfill_core::{default_codec_factory, ChannelCount, EncodeOptions, PixelBuffer, WEBP};

const KEY_OPTIONS: &str = "options";
const KEY_DATA: &str = "data";
const KEY_WIDTH: &str = "width";
const KEY_HEIGHT: &str = "height";
const KEY_USE_ALPHA: &str = "useAlpha";

/// The default option template with `quality` overridden.
///
/// # Arguments
///
/// * `quality` - Caller quality in `[0, 1]`; absent keeps the template's 75
///
/// # Returns
///
/// A plain object with every codec option key.
#[wasm_bindgen]
pub fn encode_options(quality: Option<f64>) -> Result<JsValue, JsValue> {
    let options = EncodeOptions::default().with_quality(quality);
    serde_wasm_bindgen::to_value(&options).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Build the message posted to the encoding worker.
pub(crate) fn build_message(
    buffer: &PixelBuffer,
    options: &EncodeOptions,
) -> Result<JsValue, JsValue> {
    let message = Object::new();
    let options =
        serde_wasm_bindgen::to_value(options).map_err(|e| JsValue::from_str(&e.to_string()))?;

    Reflect::set(&message, &KEY_OPTIONS.into(), &options)?;
    Reflect::set(&message, &KEY_DATA.into(), &Uint8Array::from(buffer.data.as_slice()))?;
    Reflect::set(&message, &KEY_WIDTH.into(), &buffer.width.into())?;
    Reflect::set(&message, &KEY_HEIGHT.into(), &buffer.height.into())?;
    Reflect::set(&message, &KEY_USE_ALPHA.into(), &buffer.alpha_enabled().into())?;
    Ok(message.into())
}

fn read_dimension(message: &JsValue, key: &str) -> Result<u32, JsValue> {
    Reflect::get(message, &key.into())?
        .as_f64()
        .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= u32::MAX as f64)
        .map(|v| v as u32)
        .ok_or_else(|| JsValue::from_str(&format!("message field '{}' is not a dimension", key)))
}

/// Decode a worker message back into a pixel buffer and options.
fn parse_message(message: &JsValue) -> Result<(PixelBuffer, EncodeOptions), JsValue> {
    let data = Reflect::get(message, &KEY_DATA.into())?;
    let data = data
        .dyn_into::<Uint8Array>()
        .map_err(|_| JsValue::from_str("message field 'data' is not a Uint8Array"))?
        .to_vec();

    let options = Reflect::get(message, &KEY_OPTIONS.into())?;
    let options = if options.is_undefined() {
        EncodeOptions::default()
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))?
    };

    let use_alpha = Reflect::get(message, &KEY_USE_ALPHA.into())?.as_bool().unwrap_or(true);

    let buffer = PixelBuffer {
        data,
        width: read_dimension(message, KEY_WIDTH)?,
        height: read_dimension(message, KEY_HEIGHT)?,
        channels: ChannelCount::for_alpha(use_alpha),
    };
    Ok((buffer, options))
}

/// Encode one worker message to a WebP `Blob`.
///
/// This is the worker-side handler. The codec is loaded for this message and
/// released afterwards, whether encoding succeeded or not.
///
/// # Errors
///
/// Returns an error if the message is malformed, the codec fails to load, or
/// the pixel data does not match `width * height * channels`.
#[wasm_bindgen]
pub fn encode_worker_message(message: JsValue) -> Result<Blob, JsValue> {
    let (buffer, options) = parse_message(&message)?;

    let mut codec = (default_codec_factory())().map_err(|e| JsValue::from_str(&e.to_string()))?;
    let encoded = codec.encode(
        &buffer.data,
        buffer.width,
        buffer.height,
        buffer.channels,
        &options,
    );
    codec.release();

    let bytes = encoded.map_err(|e| JsValue::from_str(&e.to_string()))?;
    blob_from_bytes(&bytes, WEBP)
}

/// Install the message handler on the current dedicated worker.
///
/// Each message is answered with the encoded `Blob`, or `null` on failure.
#[wasm_bindgen]
pub fn start_worker() -> Result<(), JsValue> {
    let scope = js_sys::global()
        .dyn_into::<DedicatedWorkerGlobalScope>()
        .map_err(|_| JsValue::from_str("start_worker must run inside a dedicated worker"))?;

    let reply_scope = scope.clone();
    let handler = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
        let reply = match encode_worker_message(event.data()) {
            Ok(blob) => blob.into(),
            Err(e) => {
                web_sys::console::error_2(&"webpfill: encode failed".into(), &e);
                JsValue::NULL
            }
        };
        if let Err(e) = reply_scope.post_message(&reply) {
            web_sys::console::error_2(&"webpfill: reply failed".into(), &e);
        }
    });

    scope.set_onmessage(Some(handler.as_ref().unchecked_ref()));
    handler.forget();
    Ok(())
}
