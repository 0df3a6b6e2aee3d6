//! Error type for the export pipeline.

use crate::codec::CodecError;
use thiserror::Error;

/// Errors that can occur while exporting a surface.
///
/// None of these are retried. Whether they reach the caller depends on the
/// configured [`FailureMode`](crate::FailureMode).
#[derive(Debug, Error)]
pub enum ExportError {
    /// The native pixel-read primitive failed.
    #[error("Pixel read failed: {0}")]
    PixelRead(String),

    /// The pixel-read primitive returned a buffer of the wrong size.
    #[error("Pixel read returned {actual} bytes, expected {expected} (width * height * 4)")]
    PixelReadMismatch { expected: usize, actual: usize },

    /// A URL-style export did not contain a decodable base64 payload.
    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(String),

    /// The native URL-style export primitive failed.
    #[error("Data URL export failed: {0}")]
    DataUrlExport(String),

    /// The codec failed inside the execution context.
    #[error("Codec failure: {0}")]
    Codec(#[from] CodecError),

    /// An execution context could not be started.
    #[error("Failed to spawn execution context: {0}")]
    Spawn(String),

    /// The execution context went away before replying.
    #[error("Execution context disconnected before replying")]
    Disconnected,

    /// No reply arrived within the configured timeout.
    #[error("No reply from execution context within {0} ms")]
    ReplyTimeout(u64),

    /// The host platform lacks a primitive this operation needs.
    #[error("Unsupported platform operation: {0}")]
    Unsupported(String),
}
