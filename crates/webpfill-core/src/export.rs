//! The export entry point: a decorator over the platform's export primitives.
//!
//! [`WebpExporter`] wraps a platform and implements the same [`BlobExport`]
//! contract. Each call is routed one of three ways:
//!
//! | requested type | native WebP | native `to_blob` | route |
//! |----------------|-------------|------------------|-------|
//! | `image/webp`   | no          | any              | encode pipeline |
//! | anything       | -           | yes              | native passthrough |
//! | anything       | -           | no               | fallback converter |
//!
//! # Example
//!
//! ```ignore
//! use webpfill_core::{BlobExport, ExportConfig, ImagePlatform, WebpExporter};
//!
//! let exporter = WebpExporter::new(ImagePlatform::new(), ExportConfig::default());
//! let surface = image::RgbaImage::new(64, 64);
//!
//! exporter.to_blob(
//!     &surface,
//!     Box::new(|blob| println!("{:?} bytes", blob.map(|b| b.len()))),
//!     Some("image/webp"),
//!     Some(0.8),
//! );
//! ```

use crate::channel::{EncodeHandle, EncodingChannel};
use crate::codec::{default_codec_factory, CodecFactory};
use crate::config::ExportConfig;
use crate::dispatch::{BlobCallback, ResultDispatcher};
use crate::error::ExportError;
use crate::extract::extract_pixels;
use crate::fallback;
use crate::media::is_target;
use crate::platform::{BlobExport, DataUrlExport};
use crate::probe::process_flag;

/// Where an export call goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportRoute {
    /// Extract pixels and encode in an execution context.
    Encode,
    /// Hand the call to the platform's native binary export unchanged.
    Native,
    /// Convert through the URL-style export.
    Fallback,
}

impl ExportRoute {
    /// Route a call.
    ///
    /// # Arguments
    /// * `media_type` - The requested media type
    /// * `native_webp` - Cached capability flag
    /// * `has_native_to_blob` - Whether the platform has a binary export at all
    pub fn decide(media_type: Option<&str>, native_webp: bool, has_native_to_blob: bool) -> Self {
        if is_target(media_type) && !native_webp {
            ExportRoute::Encode
        } else if has_native_to_blob {
            ExportRoute::Native
        } else {
            ExportRoute::Fallback
        }
    }
}

/// Export decorator filling in WebP support for a platform.
pub struct WebpExporter<P> {
    platform: P,
    native_webp: bool,
    config: ExportConfig,
    channel: EncodingChannel,
    dispatcher: ResultDispatcher,
}

impl<P: BlobExport> WebpExporter<P> {
    /// Wrap `platform`, probing native support through the process-wide flag.
    pub fn new(platform: P, config: ExportConfig) -> Self {
        let native_webp = process_flag().get_or_detect(&platform);
        Self::with_parts(platform, config, default_codec_factory(), native_webp)
    }

    /// Wrap `platform` with an explicit codec and capability value.
    pub fn with_parts(
        platform: P,
        config: ExportConfig,
        factory: CodecFactory,
        native_webp: bool,
    ) -> Self {
        Self {
            platform,
            native_webp,
            channel: EncodingChannel::new(factory, config.channel),
            dispatcher: ResultDispatcher::new(config.channel.failure_mode),
            config,
        }
    }

    /// The wrapped platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The capability flag this exporter routes with.
    pub fn native_webp(&self) -> bool {
        self.native_webp
    }

    /// The active configuration.
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// The encoding channel.
    pub fn channel(&self) -> &EncodingChannel {
        &self.channel
    }

    /// Route a call for `media_type`.
    pub fn route(&self, media_type: Option<&str>) -> ExportRoute {
        ExportRoute::decide(media_type, self.native_webp, self.platform.has_native_to_blob())
    }

    /// Run the encode pipeline for `surface` and return its handle.
    ///
    /// Pixels are extracted synchronously, so the surface may change as soon
    /// as this returns.
    pub fn encode_surface(
        &self,
        surface: &P::Surface,
        quality: Option<f64>,
    ) -> Result<EncodeHandle, ExportError> {
        let buffer = extract_pixels(surface, self.config.use_alpha)?;
        let options = self.config.options.with_quality(quality);
        self.channel.encode(buffer, options)
    }
}

impl<P: BlobExport> DataUrlExport for WebpExporter<P> {
    type Surface = P::Surface;

    fn create_surface(&self, width: u32, height: u32) -> Option<P::Surface> {
        self.platform.create_surface(width, height)
    }

    fn to_data_url(
        &self,
        surface: &P::Surface,
        media_type: Option<&str>,
        quality: Option<f64>,
    ) -> Result<String, ExportError> {
        self.platform.to_data_url(surface, media_type, quality)
    }
}

impl<P: BlobExport> BlobExport for WebpExporter<P> {
    fn has_native_to_blob(&self) -> bool {
        true
    }

    fn to_blob(
        &self,
        surface: &P::Surface,
        on_complete: BlobCallback,
        media_type: Option<&str>,
        quality: Option<f64>,
    ) {
        let route = self.route(media_type);
        log::debug!("export {:?} routed to {:?}", media_type, route);

        match route {
            ExportRoute::Encode => match self.encode_surface(surface, quality) {
                Ok(handle) => self.dispatcher.deliver_async(handle, on_complete),
                Err(e) => self.dispatcher.deliver(Err(e), on_complete),
            },
            ExportRoute::Native => self.platform.to_blob(surface, on_complete, media_type, quality),
            ExportRoute::Fallback => {
                let result = fallback::convert(&self.platform, surface, media_type, quality);
                self.dispatcher.deliver(result, on_complete);
            }
        }
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
