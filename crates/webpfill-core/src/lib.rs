//! webpfill Core - WebP export fallback pipeline
//!
//! This crate fills in `image/webp` export for hosts whose native encoder
//! cannot produce it. Export calls keep the native `toBlob` contract; when the
//! host lacks WebP support, pixels are read from the surface and encoded in an
//! isolated execution context running a WebP codec.
//!
//! # Pipeline
//!
//! - [`probe`] - one-time detection of native WebP support
//! - [`extract`] - raw pixel extraction, optionally without alpha
//! - [`channel`] - execution contexts and single-resolution encode handles
//! - [`fallback`] - synchronous conversion for hosts with no binary export
//! - [`export`] - [`WebpExporter`], the routing decorator
//! - [`dispatch`] - exactly-once delivery to completion callbacks
//!
//! # Usage
//!
//! ```ignore
//! use webpfill_core::{BlobExport, ExportConfig, ImagePlatform, WebpExporter};
//!
//! let exporter = WebpExporter::new(ImagePlatform::new(), ExportConfig::default());
//! let handle = exporter.encode_surface(&image::RgbaImage::new(8, 8), Some(0.8))?;
//! let blob = handle.wait()?;
//! assert_eq!(blob.media_type(), "image/webp");
//! ```

pub mod channel;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod extract;
pub mod fallback;
pub mod media;
pub mod options;
pub mod platform;
pub mod probe;
pub mod surface;

pub use channel::{
    ChannelState, ContextPool, EncodeHandle, EncodeRequest, EncodingChannel, ExecutionContext,
    Lease, WorkerReply,
};
#[cfg(feature = "libwebp")]
pub use codec::LibWebpCodec;
pub use codec::{
    default_codec_factory, ChannelCount, CodecError, CodecFactory, ImageWebpCodec, WebpCodec,
};
pub use config::{ChannelConfig, ExportConfig, FailureMode, PoolPolicy, DEFAULT_REPLY_TIMEOUT_MS};
pub use dispatch::{BlobCallback, ResultDispatcher};
pub use error::ExportError;
pub use export::{ExportRoute, WebpExporter};
pub use extract::{extract_pixels, strip_alpha, PixelBuffer};
pub use fallback::{convert as convert_via_data_url, decode_data_url};
pub use media::{is_target, EncodedBlob, JPEG, PNG, WEBP};
pub use options::{normalize_quality, EncodeOptions, DEFAULT_QUALITY};
pub use platform::{BlobExport, DataUrlExport, ImagePlatform};
pub use probe::{detect_native_support, process_flag, CapabilityFlag};
pub use surface::RasterSurface;

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    const MAX_WIDTH: usize = 100;

    fn collect_long_lines(dir: &Path, found: &mut Vec<String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                collect_long_lines(&path, found);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                let source = fs::read_to_string(&path).unwrap();
                for (index, line) in source.lines().enumerate() {
                    if line.chars().count() > MAX_WIDTH {
                        found.push(format!("{}:{}", path.display(), index + 1));
                    }
                }
            }
        }
    }

    #[test]
    fn test_sources_fit_line_width() {
        let crates = Path::new(env!("CARGO_MANIFEST_DIR")).join("..");
        let mut found = Vec::new();
        collect_long_lines(&crates.join("webpfill-core").join("src"), &mut found);
        collect_long_lines(&crates.join("webpfill-wasm").join("src"), &mut found);
        assert!(found.is_empty(), "lines wider than {MAX_WIDTH} columns: {found:?}");
    }
}
