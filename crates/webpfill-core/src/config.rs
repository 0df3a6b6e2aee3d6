//! Export configuration.
//!
//! All settings are plain serde data with defaults, so a host can build them
//! in Rust or deserialize them from a partial JSON/JS object:
//!
//! ```ignore
//! use webpfill_core::{ChannelConfig, ExportConfig};
//!
//! // Defaults: keep alpha, 30 s reply timeout, null on failure.
//! let config = ExportConfig::default();
//!
//! // Byte-for-byte legacy behaviour: wait forever, never report failures.
//! let legacy = ExportConfig {
//!     channel: ChannelConfig::legacy(),
//!     ..Default::default()
//! };
//! ```

use crate::options::EncodeOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time to wait for an execution context to reply.
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 30_000;

/// What the caller observes when an encode fails or times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Invoke the completion callback with `None`, like a native export that
    /// could not produce a blob.
    #[default]
    Signal,
    /// Never invoke the callback. Matches hosts where a failed encode leaves
    /// the caller waiting forever.
    Silent,
}

/// How execution contexts are reused between encode calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolPolicy {
    /// One context per call, torn down once it has replied.
    #[default]
    Dedicated,
    /// Keep up to `max_idle` contexts alive for later calls.
    Pooled { max_idle: usize },
}

impl PoolPolicy {
    /// Number of idle contexts the pool may retain.
    pub fn max_idle(self) -> usize {
        match self {
            PoolPolicy::Dedicated => 0,
            PoolPolicy::Pooled { max_idle } => max_idle,
        }
    }
}

/// Settings for the encoding channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Reply timeout in milliseconds. `None` waits indefinitely.
    pub reply_timeout_ms: Option<u64>,
    /// Failure reporting.
    pub failure_mode: FailureMode,
    /// Context reuse.
    pub pool: PoolPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: Some(DEFAULT_REPLY_TIMEOUT_MS),
            failure_mode: FailureMode::Signal,
            pool: PoolPolicy::Dedicated,
        }
    }
}

impl ChannelConfig {
    /// No timeout, silent failures, one context per call.
    pub fn legacy() -> Self {
        Self {
            reply_timeout_ms: None,
            failure_mode: FailureMode::Silent,
            pool: PoolPolicy::Dedicated,
        }
    }

    /// The reply timeout as a `Duration`.
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }
}

/// Top-level configuration of a [`WebpExporter`](crate::WebpExporter).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Keep the alpha channel. When false the WebP output is opaque.
    pub use_alpha: bool,
    /// Option template copied for every encode.
    pub options: EncodeOptions,
    /// Encoding channel settings.
    pub channel: ChannelConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            use_alpha: true,
            options: EncodeOptions::default(),
            channel: ChannelConfig::default(),
        }
    }
}

impl ExportConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
