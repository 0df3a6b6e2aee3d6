//! Media types and the encoded payload handed back to callers.

use serde::{Deserialize, Serialize};

/// Media type of the format this crate fills in for.
pub const WEBP: &str = "image/webp";

/// Media type used when a URL-style export does not name one.
pub const PNG: &str = "image/png";

/// Media type of JPEG exports.
pub const JPEG: &str = "image/jpeg";

/// Prefix every data URL of the target format starts with.
pub const WEBP_DATA_URL_PREFIX: &str = "data:image/webp";

/// Returns true if `media_type` names the target format.
///
/// The comparison is exact: `"IMAGE/WEBP"` or `"image/webp; q=1"` do not match,
/// and are passed through to the native primitive untouched.
#[inline]
pub fn is_target(media_type: Option<&str>) -> bool {
    media_type == Some(WEBP)
}

/// An immutable binary payload tagged with its media type.
///
/// This is the value passed to completion callbacks, the equivalent of a
/// browser `Blob`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedBlob {
    media_type: String,
    bytes: Vec<u8>,
}

impl EncodedBlob {
    /// Wrap `bytes` with the given media type.
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Wrap `bytes` as a WebP payload.
    pub fn webp(bytes: Vec<u8>) -> Self {
        Self::new(bytes, WEBP)
    }

    /// The media type tag.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// The payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-length payload.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Take ownership of the payload bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
