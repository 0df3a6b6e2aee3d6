//! Encoding channel: offloads a pixel buffer to an isolated execution context.
//!
//! Each call sends exactly one [`EncodeRequest`] to a leased context and gets
//! back an [`EncodeHandle`] that resolves with exactly one reply.
//!
//! # State machine
//!
//! ```text
//! Idle ──post──► Dispatched ──reply──────────► Resolved
//!                    │
//!                    └──timeout / codec error──► Rejected
//! ```
//!
//! Without a reply timeout a handle whose context never answers stays
//! `Dispatched` forever, which is indistinguishable from a slow encode.

mod pool;

pub use pool::{ContextPool, ExecutionContext, Lease};

use crate::codec::{default_codec_factory, CodecFactory};
use crate::config::ChannelConfig;
use crate::error::ExportError;
use crate::extract::PixelBuffer;
use crate::media::EncodedBlob;
use crate::options::EncodeOptions;
use pool::Job;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What an execution context sends back.
pub type WorkerReply = Result<EncodedBlob, ExportError>;

/// The single outbound message of an encode call.
///
/// Serialized keys match the message a browser worker receives:
/// `options`, `data`, `width`, `height`, `useAlpha`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeRequest {
    pub options: EncodeOptions,
    #[serde(rename = "data")]
    pub buffer: Vec<u8>,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "useAlpha")]
    pub alpha_enabled: bool,
}

impl EncodeRequest {
    /// Build the message for `buffer`.
    pub fn new(buffer: PixelBuffer, options: EncodeOptions) -> Self {
        Self {
            alpha_enabled: buffer.alpha_enabled(),
            options,
            buffer: buffer.data,
            width: buffer.width,
            height: buffer.height,
        }
    }
}

/// Lifecycle of one encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Context leased, request not posted yet.
    Idle,
    /// Request posted, waiting for the reply.
    Dispatched,
    /// Reply received.
    Resolved,
    /// Timed out, disconnected, or the codec reported a failure.
    Rejected,
}

/// Single-resolution handle for one encode call.
pub struct EncodeHandle {
    replies: Receiver<WorkerReply>,
    lease: Option<Lease>,
    timeout: Option<Duration>,
    dispatched_at: Instant,
    state: ChannelState,
}

impl EncodeHandle {
    /// Current state of the call.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Check for a reply without blocking.
    ///
    /// Returns `Some` exactly once, when the call resolves or is rejected.
    pub fn poll(&mut self) -> Option<WorkerReply> {
        if self.state != ChannelState::Dispatched {
            return None;
        }

        match self.replies.try_recv() {
            Ok(reply) => Some(self.settle(reply)),
            Err(TryRecvError::Disconnected) => Some(self.settle(Err(ExportError::Disconnected))),
            Err(TryRecvError::Empty) => match self.timeout {
                Some(timeout) if self.dispatched_at.elapsed() >= timeout => {
                    Some(self.settle(Err(timeout_error(timeout))))
                }
                _ => None,
            },
        }
    }

    /// Block until the call resolves, or until the reply timeout elapses.
    pub fn wait(mut self) -> WorkerReply {
        if self.state != ChannelState::Dispatched {
            return Err(ExportError::Disconnected);
        }

        let reply = match self.timeout {
            Some(timeout) => {
                let remaining = timeout.saturating_sub(self.dispatched_at.elapsed());
                match self.replies.recv_timeout(remaining) {
                    Ok(reply) => reply,
                    Err(RecvTimeoutError::Timeout) => Err(timeout_error(timeout)),
                    Err(RecvTimeoutError::Disconnected) => Err(ExportError::Disconnected),
                }
            }
            None => self
                .replies
                .recv()
                .unwrap_or(Err(ExportError::Disconnected)),
        };
        self.settle(reply)
    }

    fn settle(&mut self, reply: WorkerReply) -> WorkerReply {
        let lease = self.lease.take();
        match &reply {
            Ok(_) => {
                self.state = ChannelState::Resolved;
                if let Some(lease) = lease {
                    lease.release();
                }
            }
            Err(ExportError::Codec(_)) => {
                // The context answered, so it is idle again.
                self.state = ChannelState::Rejected;
                if let Some(lease) = lease {
                    lease.release();
                }
            }
            Err(_) => {
                self.state = ChannelState::Rejected;
                drop(lease);
            }
        }
        reply
    }
}

fn timeout_error(timeout: Duration) -> ExportError {
    ExportError::ReplyTimeout(timeout.as_millis() as u64)
}

/// Sends encode requests to execution contexts leased from a pool.
pub struct EncodingChannel {
    pool: Arc<ContextPool>,
    config: ChannelConfig,
}

impl EncodingChannel {
    pub fn new(factory: CodecFactory, config: ChannelConfig) -> Self {
        Self {
            pool: ContextPool::new(factory, config.pool),
            config,
        }
    }

    /// Channel running the default codec.
    pub fn with_default_codec(config: ChannelConfig) -> Self {
        Self::new(default_codec_factory(), config)
    }

    /// Dispatch one encode request.
    ///
    /// # Arguments
    /// * `buffer` - Pixels to encode; its channel count sets `alphaEnabled`
    /// * `options` - Option map passed verbatim to the codec
    ///
    /// # Returns
    /// A handle in the `Dispatched` state, or an error if no context could be
    /// started.
    pub fn encode(
        &self,
        buffer: PixelBuffer,
        options: EncodeOptions,
    ) -> Result<EncodeHandle, ExportError> {
        let lease = self.pool.acquire()?;
        let (reply, replies) = mpsc::channel();

        let mut handle = EncodeHandle {
            replies,
            lease: None,
            timeout: self.config.reply_timeout(),
            dispatched_at: Instant::now(),
            state: ChannelState::Idle,
        };

        let request = EncodeRequest::new(buffer, options);
        log::debug!(
            "dispatching {}x{} encode (alpha: {}, quality: {})",
            request.width,
            request.height,
            request.alpha_enabled,
            request.options.quality
        );
        lease.post(Job { request, reply })?;

        handle.lease = Some(lease);
        handle.dispatched_at = Instant::now();
        handle.state = ChannelState::Dispatched;
        Ok(handle)
    }

    /// The channel settings.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// The context pool backing this channel.
    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }
}
