//! Delivery of export results to completion callbacks.

use crate::channel::{EncodeHandle, WorkerReply};
use crate::config::FailureMode;
use crate::error::ExportError;
use crate::media::EncodedBlob;
use std::sync::{Arc, Mutex};
use std::thread;

/// Completion callback of an export call.
///
/// Receives `Some(blob)` on success. Under [`FailureMode::Signal`] a failed
/// export receives `None`, mirroring a native export that could not produce a
/// blob.
pub type BlobCallback = Box<dyn FnOnce(Option<EncodedBlob>) + Send + 'static>;

const DISPATCH_THREAD_NAME: &str = "webpfill-dispatch";

/// Invokes completion callbacks, at most once each.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultDispatcher {
    failure_mode: FailureMode,
}

impl ResultDispatcher {
    pub fn new(failure_mode: FailureMode) -> Self {
        Self { failure_mode }
    }

    /// The failure reporting mode.
    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Deliver a finished result on the current thread.
    pub fn deliver(&self, result: WorkerReply, on_complete: BlobCallback) {
        match result {
            Ok(blob) => on_complete(Some(blob)),
            Err(e) => match self.failure_mode {
                FailureMode::Signal => {
                    log::warn!("export failed: {}", e);
                    on_complete(None);
                }
                FailureMode::Silent => {
                    log::warn!("export failed, completion callback will not run: {}", e);
                }
            },
        }
    }

    /// Wait for `handle` on a dispatch thread, then deliver its result.
    ///
    /// Returns immediately. If the handle never resolves and has no timeout,
    /// the callback never runs.
    pub fn deliver_async(&self, handle: EncodeHandle, on_complete: BlobCallback) {
        let dispatcher = *self;
        let slot = Arc::new(Mutex::new(Some(on_complete)));
        let thread_slot = Arc::clone(&slot);

        let spawned = thread::Builder::new()
            .name(DISPATCH_THREAD_NAME.to_string())
            .spawn(move || {
                let result = handle.wait();
                if let Some(on_complete) = take_callback(&thread_slot) {
                    dispatcher.deliver(result, on_complete);
                }
            });

        if let Err(e) = spawned {
            log::error!("failed to spawn dispatch thread: {}", e);
            if let Some(on_complete) = take_callback(&slot) {
                self.deliver(Err(ExportError::Spawn(e.to_string())), on_complete);
            }
        }
    }
}

fn take_callback(slot: &Mutex<Option<BlobCallback>>) -> Option<BlobCallback> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ChannelCount, CodecError, CodecFactory, WebpCodec};
    use crate::config::ChannelConfig;
    use crate::extract::PixelBuffer;
    use crate::options::EncodeOptions;
    use crate::EncodingChannel;
    use std::sync::mpsc;
    use std::time::Duration;

    fn recording_callback() -> (BlobCallback, mpsc::Receiver<Option<EncodedBlob>>) {
        let (tx, rx) = mpsc::channel();
        let callback: BlobCallback = Box::new(move |blob| {
            let _ = tx.send(blob);
        });
        (callback, rx)
    }

    fn failing_factory() -> CodecFactory {
        Arc::new(|| Err(CodecError::Load("no codec".to_string())))
    }

    fn buffer() -> PixelBuffer {
        PixelBuffer {
            data: vec![0; 4],
            width: 1,
            height: 1,
            channels: ChannelCount::Rgba,
        }
    }

    #[test]
    fn test_deliver_success() {
        let (callback, rx) = recording_callback();
        ResultDispatcher::default().deliver(Ok(EncodedBlob::webp(vec![9])), callback);

        let blob = rx.recv().unwrap().unwrap();
        assert_eq!(blob.bytes(), &[9]);
        assert!(rx.try_recv().is_err());
    }

    #[test_log::test]
    fn test_signal_mode_delivers_none() {
        let (callback, rx) = recording_callback();
        ResultDispatcher::new(FailureMode::Signal)
            .deliver(Err(ExportError::Disconnected), callback);
        assert_eq!(rx.recv().unwrap(), None);
    }

    #[test_log::test]
    fn test_silent_mode_never_invokes() {
        let (callback, rx) = recording_callback();
        ResultDispatcher::new(FailureMode::Silent)
            .deliver(Err(ExportError::Disconnected), callback);
        // The callback (and its sender) was dropped without being called.
        assert!(matches!(rx.recv(), Err(mpsc::RecvError)));
    }

    #[test]
    fn test_deliver_async_success() {
        let channel = EncodingChannel::with_default_codec(ChannelConfig::default());
        let handle = channel.encode(buffer(), EncodeOptions::default()).unwrap();

        let (callback, rx) = recording_callback();
        ResultDispatcher::default().deliver_async(handle, callback);

        let blob = rx.recv_timeout(Duration::from_secs(10)).unwrap().unwrap();
        assert_eq!(blob.media_type(), "image/webp");
    }

    #[test]
    fn test_deliver_async_codec_failure_signal() {
        let channel = EncodingChannel::new(failing_factory(), ChannelConfig::default());
        let handle = channel.encode(buffer(), EncodeOptions::default()).unwrap();

        let (callback, rx) = recording_callback();
        ResultDispatcher::new(FailureMode::Signal).deliver_async(handle, callback);
        assert_eq!(rx.recv_timeout(Duration::from_secs(10)).unwrap(), None);
    }

    #[test]
    fn test_deliver_async_codec_failure_silent() {
        let channel = EncodingChannel::new(failing_factory(), ChannelConfig::legacy());
        let handle = channel.encode(buffer(), EncodeOptions::default()).unwrap();

        let (callback, rx) = recording_callback();
        ResultDispatcher::new(FailureMode::Silent).deliver_async(handle, callback);
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(10)),
            Err(mpsc::RecvTimeoutError::Disconnected)
        ));
    }

    struct NeverCodec;

    impl WebpCodec for NeverCodec {
        fn encode(
            &mut self,
            _buffer: &[u8],
            _width: u32,
            _height: u32,
            _channels: ChannelCount,
            _options: &EncodeOptions,
        ) -> Result<Vec<u8>, CodecError> {
            std::thread::sleep(Duration::from_secs(2));
            Ok(Vec::new())
        }

        fn release(&mut self) {}
    }

    #[test_log::test]
    fn test_deliver_async_timeout_signals_none() {
        let factory: CodecFactory = Arc::new(|| Ok(Box::new(NeverCodec) as Box<dyn WebpCodec>));
        let config = ChannelConfig {
            reply_timeout_ms: Some(20),
            ..Default::default()
        };
        let channel = EncodingChannel::new(factory, config);
        let handle = channel.encode(buffer(), EncodeOptions::default()).unwrap();

        let (callback, rx) = recording_callback();
        ResultDispatcher::new(FailureMode::Signal).deliver_async(handle, callback);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), None);
    }
}
