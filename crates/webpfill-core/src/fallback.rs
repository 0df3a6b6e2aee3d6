//! Synchronous export for platforms without a native binary export.
//!
//! The surface is exported through the URL-style primitive and the base64
//! payload of the data URL is decoded back into bytes.

use crate::error::ExportError;
use crate::media::{EncodedBlob, PNG};
use crate::platform::DataUrlExport;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Decode the base64 payload of a `data:` URL (everything after the first comma).
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, ExportError> {
    let (_, payload) = url
        .split_once(',')
        .ok_or_else(|| ExportError::MalformedDataUrl("missing ',' separator".to_string()))?;

    STANDARD
        .decode(payload)
        .map_err(|e| ExportError::MalformedDataUrl(e.to_string()))
}

/// Convert `surface` to a blob through the URL-style export.
///
/// The blob is tagged with `media_type`, or `image/png` when it is absent or
/// empty.
pub fn convert<P>(
    platform: &P,
    surface: &P::Surface,
    media_type: Option<&str>,
    quality: Option<f64>,
) -> Result<EncodedBlob, ExportError>
where
    P: DataUrlExport + ?Sized,
{
    let url = platform.to_data_url(surface, media_type, quality)?;
    let bytes = decode_data_url(&url)?;
    let media_type = media_type.filter(|m| !m.is_empty()).unwrap_or(PNG);
    Ok(EncodedBlob::new(bytes, media_type))
}
