//! WebP encoding through libwebp.
//!
//! Every key of [`EncodeOptions`] maps one-to-one onto a `WebPConfig` field,
//! so this codec honours lossy quality, alpha settings and the rest of the
//! tuning map exactly as given.

use super::{validate_buffer, ChannelCount, CodecError, WebpCodec};
use crate::options::EncodeOptions;
use libwebp_sys::{WebPConfig, WebPImageHint};
use webp::Encoder;

/// WebP codec backed by libwebp.
#[derive(Default)]
pub struct LibWebpCodec {
    config: Option<WebPConfig>,
}

impl LibWebpCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn configure(options: &EncodeOptions) -> Result<WebPConfig, CodecError> {
        let mut config = WebPConfig::new()
            .map_err(|_| CodecError::Load("libwebp version mismatch".to_string()))?;

        config.quality = f32::from(options.quality);
        config.target_size = options.target_size;
        config.target_PSNR = options.target_psnr;
        config.method = options.method;
        config.sns_strength = options.sns_strength;
        config.filter_strength = options.filter_strength;
        config.filter_sharpness = options.filter_sharpness;
        config.filter_type = options.filter_type;
        config.partitions = options.partitions;
        config.segments = options.segments;
        config.pass = options.pass;
        config.show_compressed = options.show_compressed;
        config.preprocessing = options.preprocessing;
        config.autofilter = options.autofilter;
        config.partition_limit = options.partition_limit;
        config.alpha_compression = options.alpha_compression;
        config.alpha_filtering = options.alpha_filtering;
        config.alpha_quality = options.alpha_quality;
        config.lossless = options.lossless;
        config.exact = options.exact;
        config.image_hint = image_hint(options.image_hint);
        config.emulate_jpeg_size = options.emulate_jpeg_size;
        config.thread_level = options.thread_level;
        config.low_memory = options.low_memory;
        config.near_lossless = options.near_lossless;
        config.use_delta_palette = options.use_delta_palette;
        config.use_sharp_yuv = options.use_sharp_yuv;

        Ok(config)
    }
}

fn image_hint(value: i32) -> WebPImageHint {
    match value {
        1 => WebPImageHint::WEBP_HINT_PICTURE,
        2 => WebPImageHint::WEBP_HINT_PHOTO,
        3 => WebPImageHint::WEBP_HINT_GRAPH,
        _ => WebPImageHint::WEBP_HINT_DEFAULT,
    }
}

impl WebpCodec for LibWebpCodec {
    fn encode(
        &mut self,
        buffer: &[u8],
        width: u32,
        height: u32,
        channels: ChannelCount,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>, CodecError> {
        validate_buffer(buffer, width, height, channels)?;

        let config = self.config.insert(Self::configure(options)?);

        let encoder = match channels {
            ChannelCount::Rgb => Encoder::from_rgb(buffer, width, height),
            ChannelCount::Rgba => Encoder::from_rgba(buffer, width, height),
        };

        let memory = encoder
            .encode_advanced(config)
            .map_err(|e| CodecError::EncodingFailed(format!("{:?}", e)))?;

        Ok(memory.to_vec())
    }

    fn release(&mut self) {
        self.config = None;
    }
}
