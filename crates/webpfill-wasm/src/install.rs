//! Installation of the `toBlob` augmentation on `HTMLCanvasElement`.
//!
//! After [`install`], every `canvas.toBlob(callback, type, quality)` call is
//! routed with [`ExportRoute::decide`]:
//!
//! - `image/webp` without native support: pixels are read on the page and
//!   encoded in a module Web Worker spawned from `worker_url`
//! - anything else: the browser's original `toBlob`
//! - no original `toBlob` at all: [`canvas_to_blob_fallback`]
//!
//! # Example
//!
//! ```typescript
//! import init, { install } from '@webpfill/wasm';
//!
//! await init();
//! install('/webpfill-worker.js', { use_alpha: false });
//!
//! canvas.toBlob((blob) => upload(blob), 'image/webp', 0.8);
//! ```

use crate::canvas::{
    canvas_to_blob_fallback, extract_canvas_pixels, js_error_message, BrowserPlatform,
};
use crate::worker::build_message;
use js_sys::{Function, Reflect};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{console, HtmlCanvasElement, MessageEvent, Worker, WorkerOptions, WorkerType};
use webpfill_core::{
    process_flag, ChannelCount, ExportConfig, ExportRoute, FailureMode, PixelBuffer, PoolPolicy,
};

thread_local! {
    static INSTALLED: Cell<bool> = const { Cell::new(false) };
}

#[wasm_bindgen(inline_js = "
export function define_to_blob(proto, handler) {
    const original = proto.toBlob;
    Object.defineProperty(proto, 'toBlob', {
        value: function (callback, type, quality) {
            handler(this, callback, type, quality);
        },
        configurable: true,
        writable: true,
    });
    return original;
}
")]
extern "C" {
    fn define_to_blob(proto: &JsValue, handler: &Function) -> JsValue;
}

type ToBlobHandler = dyn FnMut(JsValue, JsValue, JsValue, JsValue) -> Result<(), JsValue>;

/// Everything a `toBlob` call needs, captured once at installation.
struct Installation {
    worker_url: String,
    config: ExportConfig,
    native_webp: bool,
    original: Option<Function>,
}

/// Install the `toBlob` augmentation.
///
/// Idempotent: only the first call installs anything.
///
/// # Arguments
///
/// * `worker_url` - ES module script of the encoding worker (see `start_worker`)
/// * `config` - Optional `ExportConfig` object; omitted keys keep their defaults
///
/// # Returns
///
/// `true` if this call installed the augmentation, `false` if it was already
/// installed.
#[wasm_bindgen]
pub fn install(worker_url: &str, config: JsValue) -> Result<bool, JsValue> {
    if INSTALLED.with(Cell::get) {
        return Ok(false);
    }

    let config: ExportConfig = if config.is_undefined() || config.is_null() {
        ExportConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config).map_err(|e| JsValue::from_str(&e.to_string()))?
    };
    if matches!(config.channel.pool, PoolPolicy::Pooled { .. }) {
        console::warn_1(
            &"webpfill: pooled workers are not supported, using one worker per call".into(),
        );
    }

    let proto = Reflect::get(&js_sys::global(), &"HTMLCanvasElement".into())
        .and_then(|ctor| Reflect::get(&ctor, &"prototype".into()))?;
    if proto.is_undefined() {
        return Err(JsValue::from_str("HTMLCanvasElement is not available"));
    }

    let state = Rc::new(RefCell::new(Installation {
        worker_url: worker_url.to_string(),
        config,
        native_webp: process_flag().get_or_detect(&BrowserPlatform),
        original: None,
    }));

    let handler_state = Rc::clone(&state);
    let handler = Closure::<ToBlobHandler>::new(
        move |this: JsValue, callback: JsValue, media_type: JsValue, quality: JsValue| {
            handle_to_blob(&handler_state.borrow(), this, callback, media_type, quality)
        },
    );

    let original = define_to_blob(&proto, handler.as_ref().unchecked_ref());
    state.borrow_mut().original = original.dyn_into::<Function>().ok();
    handler.forget();

    INSTALLED.with(|installed| installed.set(true));
    let state = state.borrow();
    console::debug_1(
        &format!(
            "webpfill: installed (native webp: {}, native toBlob: {})",
            state.native_webp,
            state.original.is_some()
        )
        .into(),
    );
    Ok(true)
}

/// Whether [`install`] already ran in this context.
#[wasm_bindgen]
pub fn is_installed() -> bool {
    INSTALLED.with(Cell::get)
}

fn handle_to_blob(
    state: &Installation,
    this: JsValue,
    callback: JsValue,
    media_type: JsValue,
    quality: JsValue,
) -> Result<(), JsValue> {
    let callback = callback
        .dyn_into::<Function>()
        .map_err(|_| js_sys::TypeError::new("toBlob callback is not a function"))?;
    let canvas = this
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| js_sys::TypeError::new("toBlob called on a non-canvas receiver"))?;

    let requested = media_type.as_string();
    let route = ExportRoute::decide(
        requested.as_deref(),
        state.native_webp,
        state.original.is_some(),
    );
    let failure_mode = state.config.channel.failure_mode;

    match (route, &state.original) {
        (ExportRoute::Native, Some(original)) => {
            original.call3(&canvas, &callback, &media_type, &quality)?;
        }
        (ExportRoute::Encode, _) => {
            if let Err(e) = encode_in_worker(state, &canvas, &callback, quality.as_f64()) {
                fail(failure_mode, callback, &js_error_message(&e));
            }
        }
        _ => match canvas_to_blob_fallback(&canvas, requested, quality.as_f64()) {
            Ok(blob) => {
                callback.call1(&JsValue::NULL, &blob)?;
            }
            Err(e) => fail(failure_mode, callback, &js_error_message(&e)),
        },
    }
    Ok(())
}

/// Report a failed export according to `mode`.
fn fail(mode: FailureMode, callback: Function, reason: &str) {
    console::warn_1(&format!("webpfill: export failed: {}", reason).into());
    if mode == FailureMode::Signal {
        if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::NULL) {
            console::error_2(&"webpfill: completion callback threw".into(), &e);
        }
    }
}

/// One in-flight worker encode. The callback is taken on first settlement.
struct PendingReply {
    callback: RefCell<Option<Function>>,
    worker: Worker,
    failure_mode: FailureMode,
    timer: Cell<Option<i32>>,
}

impl PendingReply {
    fn take(&self) -> Option<Function> {
        let callback = self.callback.borrow_mut().take();
        if callback.is_some() {
            self.worker.terminate();
            if let (Some(timer), Some(window)) = (self.timer.take(), web_sys::window()) {
                window.clear_timeout_with_handle(timer);
            }
        }
        callback
    }

    fn resolve(&self, reply: JsValue) {
        if !reply.is_instance_of::<web_sys::Blob>() {
            self.reject("worker replied without a blob");
            return;
        }
        if let Some(callback) = self.take() {
            if let Err(e) = callback.call1(&JsValue::NULL, &reply) {
                console::error_2(&"webpfill: completion callback threw".into(), &e);
            }
        }
    }

    fn reject(&self, reason: &str) {
        if let Some(callback) = self.take() {
            fail(self.failure_mode, callback, reason);
        }
    }
}

/// Read `canvas` and post it to a fresh worker.
///
/// Errors before the worker owns the call are returned; later ones settle
/// the pending reply instead, so the callback still runs at most once.
fn encode_in_worker(
    state: &Installation,
    canvas: &HtmlCanvasElement,
    callback: &Function,
    quality: Option<f64>,
) -> Result<(), JsValue> {
    let use_alpha = state.config.use_alpha;
    let buffer = PixelBuffer {
        data: extract_canvas_pixels(canvas, use_alpha)?,
        width: canvas.width(),
        height: canvas.height(),
        channels: ChannelCount::for_alpha(use_alpha),
    };
    let options = state.config.options.with_quality(quality);
    let message = build_message(&buffer, &options)?;

    let worker = spawn_worker(&state.worker_url)?;
    let pending = Rc::new(PendingReply {
        callback: RefCell::new(Some(callback.clone())),
        worker: worker.clone(),
        failure_mode: state.config.channel.failure_mode,
        timer: Cell::new(None),
    });

    if let Err(e) = post(&pending, &worker, &message, state.config.channel.reply_timeout_ms) {
        pending.reject(&js_error_message(&e));
    }
    Ok(())
}

/// Start the worker script as an ES module, the form `start_worker` is
/// imported from.
fn spawn_worker(url: &str) -> Result<Worker, JsValue> {
    let options = WorkerOptions::new();
    options.set_type(WorkerType::Module);
    Worker::new_with_options(url, &options)
}

fn post(
    pending: &Rc<PendingReply>,
    worker: &Worker,
    message: &JsValue,
    timeout_ms: Option<u64>,
) -> Result<(), JsValue> {
    let on_reply = Rc::clone(pending);
    let on_message =
        Closure::once_into_js(move |event: MessageEvent| on_reply.resolve(event.data()));
    worker.set_onmessage(Some(on_message.unchecked_ref()));

    let on_failure = Rc::clone(pending);
    let on_error =
        Closure::once_into_js(move |_event: JsValue| on_failure.reject("worker raised an error"));
    worker.set_onerror(Some(on_error.unchecked_ref()));

    worker.post_message(message)?;

    if let (Some(timeout_ms), Some(window)) = (timeout_ms, web_sys::window()) {
        let on_timeout = Rc::clone(pending);
        let expire = Closure::once_into_js(move || {
            on_timeout.reject(&format!("no reply within {} ms", timeout_ms));
        });
        let timer = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            expire.unchecked_ref(),
            timeout_ms.min(i32::MAX as u64) as i32,
        )?;
        pending.timer.set(Some(timer));
    }
    Ok(())
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use js_sys::{Array, Promise, Uint8Array};
    use wasm_bindgen_futures::JsFuture;
    use wasm_bindgen_test::*;
    use web_sys::{Blob, BlobPropertyBag, Url};
    use webpfill_core::{ChannelConfig, DataUrlExport, PNG, WEBP};

    wasm_bindgen_test_configure!(run_in_browser);

    /// Replies with the pixel bytes followed by the requested quality.
    const ECHO_WORKER: &str = "
        self.onmessage = (event) => {
            const { data, options } = event.data;
            const tail = new Uint8Array([options.quality]);
            self.postMessage(new Blob([data, tail], { type: 'image/webp' }));
        };
    ";
    const TEXT_WORKER: &str = "self.onmessage = () => self.postMessage('oops');";
    const NULL_WORKER: &str = "self.onmessage = () => self.postMessage(null);";
    const MUTE_WORKER: &str = "self.onmessage = () => {};";

    fn worker_url(code: &str) -> String {
        let options = BlobPropertyBag::new();
        options.set_type("application/javascript");
        let parts = Array::of1(&JsValue::from_str(code));
        let blob = Blob::new_with_str_sequence_and_options(&parts, &options).unwrap();
        Url::create_object_url_with_blob(&blob).unwrap()
    }

    async fn sleep(ms: i32) {
        let promise = Promise::new(&mut |resolve, _reject| {
            web_sys::window()
                .unwrap()
                .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
                .unwrap();
        });
        JsFuture::from(promise).await.unwrap();
    }

    /// A JS callback recording every value it is called with.
    struct Recorder {
        calls: Rc<RefCell<Vec<JsValue>>>,
        function: Function,
        _closure: Closure<dyn FnMut(JsValue)>,
    }

    impl Recorder {
        fn new() -> Self {
            let calls = Rc::new(RefCell::new(Vec::new()));
            let seen = Rc::clone(&calls);
            let closure = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
                seen.borrow_mut().push(value);
            });
            let function = closure.as_ref().unchecked_ref::<Function>().clone();
            Self {
                calls,
                function,
                _closure: closure,
            }
        }

        fn calls(&self) -> Vec<JsValue> {
            self.calls.borrow().clone()
        }

        /// Wait for the first call, then a while longer for any second one.
        async fn settle(&self) -> Vec<JsValue> {
            for _ in 0..50 {
                if !self.calls.borrow().is_empty() {
                    break;
                }
                sleep(20).await;
            }
            sleep(100).await;
            self.calls()
        }
    }

    fn state(worker: &str, channel: ChannelConfig) -> Installation {
        Installation {
            worker_url: worker_url(worker),
            config: ExportConfig {
                channel,
                ..Default::default()
            },
            native_webp: false,
            original: None,
        }
    }

    fn blank_canvas() -> HtmlCanvasElement {
        BrowserPlatform.create_surface(2, 2).unwrap().canvas().clone()
    }

    fn to_blob(state: &Installation, recorder: &Recorder, media_type: JsValue, quality: f64) {
        handle_to_blob(
            state,
            blank_canvas().into(),
            recorder.function.clone().into(),
            media_type,
            JsValue::from_f64(quality),
        )
        .unwrap();
    }

    async fn blob_bytes(blob: &Blob) -> Vec<u8> {
        let buffer = JsFuture::from(blob.array_buffer()).await.unwrap();
        Uint8Array::new(&buffer).to_vec()
    }

    #[wasm_bindgen_test]
    async fn test_install_routes_canvas_to_blob() {
        assert!(install(&worker_url(ECHO_WORKER), JsValue::UNDEFINED).unwrap());
        assert!(!install(&worker_url(ECHO_WORKER), JsValue::UNDEFINED).unwrap());
        assert!(is_installed());

        let canvas = blank_canvas();
        let method: Function = Reflect::get(&canvas, &"toBlob".into()).unwrap().unchecked_into();
        let recorder = Recorder::new();
        method.call2(&canvas, &recorder.function, &JsValue::from_str(WEBP)).unwrap();

        let calls = recorder.settle().await;
        assert_eq!(calls.len(), 1);
        let blob: Blob = calls[0].clone().dyn_into().unwrap();
        assert_eq!(blob.type_(), WEBP);
    }

    #[wasm_bindgen_test]
    async fn test_module_worker_encodes_once() {
        let state = state(ECHO_WORKER, ChannelConfig::default());
        let recorder = Recorder::new();
        to_blob(&state, &recorder, JsValue::from_str(WEBP), 0.9);

        let calls = recorder.settle().await;
        assert_eq!(calls.len(), 1);
        let blob: Blob = calls[0].clone().dyn_into().unwrap();
        assert_eq!(blob.type_(), WEBP);

        let bytes = blob_bytes(&blob).await;
        assert_eq!(bytes.len(), 2 * 2 * 4 + 1);
        assert_eq!(bytes.last(), Some(&90));
    }

    #[wasm_bindgen_test]
    async fn test_worker_receives_rgb_without_alpha() {
        let mut state = state(ECHO_WORKER, ChannelConfig::default());
        state.config.use_alpha = false;
        let recorder = Recorder::new();
        to_blob(&state, &recorder, JsValue::from_str(WEBP), 0.5);

        let calls = recorder.settle().await;
        assert_eq!(calls.len(), 1);
        let blob: Blob = calls[0].clone().dyn_into().unwrap();
        let bytes = blob_bytes(&blob).await;
        assert_eq!(bytes.len(), 2 * 2 * 3 + 1);
        assert_eq!(bytes.last(), Some(&50));
    }

    #[wasm_bindgen_test]
    async fn test_non_blob_reply_calls_back_null() {
        let state = state(TEXT_WORKER, ChannelConfig::default());
        let recorder = Recorder::new();
        to_blob(&state, &recorder, JsValue::from_str(WEBP), 0.9);

        let calls = recorder.settle().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_null());
    }

    #[wasm_bindgen_test]
    async fn test_silent_worker_times_out_once() {
        let channel = ChannelConfig {
            reply_timeout_ms: Some(30),
            ..ChannelConfig::default()
        };
        let state = state(MUTE_WORKER, channel);
        let recorder = Recorder::new();
        to_blob(&state, &recorder, JsValue::from_str(WEBP), 0.9);

        let calls = recorder.settle().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_null());
    }

    #[wasm_bindgen_test]
    async fn test_legacy_mode_never_calls_back_on_failed_reply() {
        let state = state(NULL_WORKER, ChannelConfig::legacy());
        let recorder = Recorder::new();
        to_blob(&state, &recorder, JsValue::from_str(WEBP), 0.9);

        assert!(recorder.settle().await.is_empty());
    }

    #[wasm_bindgen_test]
    fn test_native_route_calls_original() {
        let mut state = state(MUTE_WORKER, ChannelConfig::default());
        state.native_webp = true;
        state.original = Some(Function::new_with_args(
            "callback, type, quality",
            "callback('native:' + type + ':' + quality)",
        ));
        let recorder = Recorder::new();
        to_blob(&state, &recorder, JsValue::from_str(WEBP), 0.5);

        let calls = recorder.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].as_string().as_deref(), Some("native:image/webp:0.5"));
    }

    #[wasm_bindgen_test]
    fn test_missing_original_uses_fallback() {
        let state = state(MUTE_WORKER, ChannelConfig::default());
        let recorder = Recorder::new();
        to_blob(&state, &recorder, JsValue::UNDEFINED, 0.5);

        let calls = recorder.calls();
        assert_eq!(calls.len(), 1);
        let blob: Blob = calls[0].clone().dyn_into().unwrap();
        assert_eq!(blob.type_(), PNG);
    }

    #[wasm_bindgen_test]
    fn test_non_function_callback_throws() {
        let state = state(MUTE_WORKER, ChannelConfig::default());
        let result = handle_to_blob(
            &state,
            blank_canvas().into(),
            JsValue::NULL,
            JsValue::from_str(WEBP),
            JsValue::UNDEFINED,
        );
        assert!(result.unwrap_err().is_instance_of::<js_sys::TypeError>());
    }

    #[wasm_bindgen_test]
    fn test_pending_reply_settles_once() {
        let recorder = Recorder::new();
        let pending = PendingReply {
            callback: RefCell::new(Some(recorder.function.clone())),
            worker: spawn_worker(&worker_url(MUTE_WORKER)).unwrap(),
            failure_mode: FailureMode::Signal,
            timer: Cell::new(None),
        };

        let blob = Blob::new().unwrap();
        pending.resolve(blob.clone().into());
        pending.reject("late failure");
        pending.resolve(blob.into());

        let calls = recorder.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_instance_of::<Blob>());
    }

    #[wasm_bindgen_test]
    fn test_pending_reply_rejected_first_ignores_reply() {
        let recorder = Recorder::new();
        let pending = PendingReply {
            callback: RefCell::new(Some(recorder.function.clone())),
            worker: spawn_worker(&worker_url(MUTE_WORKER)).unwrap(),
            failure_mode: FailureMode::Signal,
            timer: Cell::new(None),
        };

        pending.reject("timed out");
        pending.resolve(Blob::new().unwrap().into());

        let calls = recorder.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_null());
    }

    #[wasm_bindgen_test]
    fn test_signal_failure_calls_back_null() {
        let recorder = Recorder::new();

        fail(FailureMode::Signal, recorder.function.clone(), "test");
        fail(FailureMode::Silent, recorder.function.clone(), "test");

        let calls = recorder.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_null());
    }
}
