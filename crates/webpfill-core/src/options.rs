//! WebP encoder tuning options.
//!
//! [`EncodeOptions`] is the fixed-schema option map sent to the codec with
//! every encode request. The key names match libwebp's `WebPConfig` fields and
//! are serialized verbatim, so the same map can cross a worker boundary as a
//! plain object.
//!
//! The default value is the shared template. Callers never mutate it; each
//! export copies it and overrides only `quality`:
//!
//! ```ignore
//! use webpfill_core::EncodeOptions;
//!
//! let template = EncodeOptions::default();
//! let options = template.with_quality(Some(0.8));
//! assert_eq!(options.quality, 80);
//! assert_eq!(template.quality, 75);
//! ```

use serde::{Deserialize, Serialize};

/// Quality used when the caller does not supply one.
pub const DEFAULT_QUALITY: u8 = 75;

/// Convert a caller quality in `[0, 1]` to the codec's `[0, 100]` scale.
///
/// Values outside the range are clamped. Returns `None` for non-finite input
/// so the template's quality is kept.
///
/// # Examples
/// * `0.8` -> `80`
/// * `0.0` -> `0`
/// * `1.0` -> `100`
/// * `1.7` -> `100`
pub fn normalize_quality(quality: f64) -> Option<u8> {
    if !quality.is_finite() {
        return None;
    }
    Some((quality.clamp(0.0, 1.0) * 100.0).round() as u8)
}

/// WebP encoder options, one field per libwebp `WebPConfig` key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Quality factor (0 = smallest file, 100 = best quality)
    pub quality: u8,
    /// Target size in bytes (0 = disabled)
    pub target_size: i32,
    /// Target PSNR in dB (0 = disabled)
    #[serde(rename = "target_PSNR")]
    pub target_psnr: f32,
    /// Speed/quality trade-off (0 = fast, 6 = slower but better)
    pub method: i32,
    /// Spatial noise shaping strength (0-100)
    pub sns_strength: i32,
    /// Deblocking filter strength (0 = off, 100 = strongest)
    pub filter_strength: i32,
    /// Filter sharpness (0 = sharpest, 7 = least sharp)
    pub filter_sharpness: i32,
    /// Filter type (0 = simple, 1 = strong)
    pub filter_type: i32,
    /// log2 of the number of token partitions (0-3)
    pub partitions: i32,
    /// Maximum number of segments (1-4)
    pub segments: i32,
    /// Number of entropy analysis passes (1-10)
    pub pass: i32,
    /// Export the compressed picture back into the source picture
    pub show_compressed: i32,
    /// Preprocessing filter (0 = none, 1 = segment-smooth, 2 = pseudo-random dithering)
    pub preprocessing: i32,
    /// Auto-adjust filter strength
    pub autofilter: i32,
    /// Quality degradation allowed to fit the 512k partition limit (0-100)
    pub partition_limit: i32,
    /// Alpha plane compression (0 = none, 1 = lossless)
    pub alpha_compression: i32,
    /// Alpha predictive filtering (0 = none, 1 = fast, 2 = best)
    pub alpha_filtering: i32,
    /// Alpha plane quality (0-100)
    pub alpha_quality: i32,
    /// Lossless encoding (0 = lossy, 1 = lossless)
    pub lossless: i32,
    /// Preserve RGB values under fully transparent pixels
    pub exact: i32,
    /// Image type hint (0 = default, 1 = picture, 2 = photo, 3 = graph)
    pub image_hint: i32,
    /// Mimic JPEG compression size for the same quality
    pub emulate_jpeg_size: i32,
    /// Use multi-threaded encoding where available
    pub thread_level: i32,
    /// Reduce memory usage at the cost of speed
    pub low_memory: i32,
    /// Near-lossless preprocessing level (100 = off)
    pub near_lossless: i32,
    /// Use delta palettization
    pub use_delta_palette: i32,
    /// Use sharp (slower) RGB to YUV conversion
    pub use_sharp_yuv: i32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            target_size: 0,
            target_psnr: 0.0,
            method: 4,
            sns_strength: 50,
            filter_strength: 60,
            filter_sharpness: 0,
            filter_type: 1,
            partitions: 0,
            segments: 4,
            pass: 1,
            show_compressed: 0,
            preprocessing: 0,
            autofilter: 0,
            partition_limit: 0,
            alpha_compression: 1,
            alpha_filtering: 1,
            alpha_quality: 100,
            lossless: 0,
            exact: 0,
            image_hint: 0,
            emulate_jpeg_size: 0,
            thread_level: 0,
            low_memory: 0,
            near_lossless: 100,
            use_delta_palette: 0,
            use_sharp_yuv: 0,
        }
    }
}

impl EncodeOptions {
    /// Copy these options, overriding `quality` with a caller value in `[0, 1]`.
    ///
    /// `None` or a non-finite value keeps the current quality.
    pub fn with_quality(&self, quality: Option<f64>) -> Self {
        let mut options = *self;
        if let Some(q) = quality.and_then(normalize_quality) {
            options.quality = q;
        }
        options
    }

    /// True when the options request lossless encoding.
    pub fn is_lossless(&self) -> bool {
        self.lossless != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_quality_examples() {
        assert_eq!(normalize_quality(0.8), Some(80));
        assert_eq!(normalize_quality(0.0), Some(0));
        assert_eq!(normalize_quality(1.0), Some(100));
        assert_eq!(normalize_quality(0.9), Some(90));
    }

    #[test]
    fn test_normalize_quality_clamps() {
        assert_eq!(normalize_quality(-0.5), Some(0));
        assert_eq!(normalize_quality(3.0), Some(100));
    }

    #[test]
    fn test_normalize_quality_non_finite() {
        assert_eq!(normalize_quality(f64::NAN), None);
        assert_eq!(normalize_quality(f64::INFINITY), None);
    }

    #[test]
    fn test_with_quality_leaves_template_untouched() {
        let template = EncodeOptions::default();
        let options = template.with_quality(Some(0.8));
        assert_eq!(options.quality, 80);
        assert_eq!(template.quality, DEFAULT_QUALITY);
    }

    #[test]
    fn test_with_quality_none_keeps_default() {
        let options = EncodeOptions::default().with_quality(None);
        assert_eq!(options.quality, 75);

        let options = EncodeOptions::default().with_quality(Some(f64::NAN));
        assert_eq!(options.quality, 75);
    }

    #[test]
    fn test_with_quality_only_changes_quality() {
        let template = EncodeOptions::default();
        let mut expected = template;
        expected.quality = 10;
        assert_eq!(template.with_quality(Some(0.1)), expected);
    }

    #[test]
    fn test_default_template_values() {
        let options = EncodeOptions::default();
        assert_eq!(options.method, 4);
        assert_eq!(options.sns_strength, 50);
        assert_eq!(options.filter_strength, 60);
        assert_eq!(options.filter_type, 1);
        assert_eq!(options.segments, 4);
        assert_eq!(options.pass, 1);
        assert_eq!(options.alpha_compression, 1);
        assert_eq!(options.alpha_filtering, 1);
        assert_eq!(options.alpha_quality, 100);
        assert_eq!(options.near_lossless, 100);
        assert!(!options.is_lossless());
    }

    #[test]
    fn test_partial_options_fill_from_template() {
        use serde::de::value::{Error, MapDeserializer};

        let fields = vec![("method", 6i32), ("lossless", 1i32)];
        let deserializer = MapDeserializer::<_, Error>::new(fields.into_iter());
        let options = EncodeOptions::deserialize(deserializer).unwrap();
        assert_eq!(options.method, 6);
        assert!(options.is_lossless());
        assert_eq!(options.quality, DEFAULT_QUALITY);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
