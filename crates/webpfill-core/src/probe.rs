//! One-time detection of native WebP export support.

use crate::media::{WEBP, WEBP_DATA_URL_PREFIX};
use crate::platform::DataUrlExport;
use std::sync::OnceLock;

/// Ask `platform` whether it can export WebP natively.
///
/// Creates a 1x1 surface, exports it as `image/webp` through the URL-style
/// primitive and checks that the result really is a WebP data URL. Platforms
/// without WebP support silently return PNG instead.
pub fn detect_native_support<P>(platform: &P) -> bool
where
    P: DataUrlExport + ?Sized,
{
    let Some(surface) = platform.create_surface(1, 1) else {
        log::debug!("probe: platform cannot create a surface");
        return false;
    };

    match platform.to_data_url(&surface, Some(WEBP), None) {
        Ok(url) => url.starts_with(WEBP_DATA_URL_PREFIX),
        Err(e) => {
            log::debug!("probe: data URL export failed: {}", e);
            false
        }
    }
}

/// A capability flag computed at most once.
#[derive(Debug, Default)]
pub struct CapabilityFlag(OnceLock<bool>);

impl CapabilityFlag {
    /// An undetermined flag.
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// A flag with a known value; probing will never run.
    pub fn known(native_webp: bool) -> Self {
        Self(OnceLock::from(native_webp))
    }

    /// The cached value, if detection already happened.
    pub fn get(&self) -> Option<bool> {
        self.0.get().copied()
    }

    /// The cached value, probing `platform` on first use.
    pub fn get_or_detect<P>(&self, platform: &P) -> bool
    where
        P: DataUrlExport + ?Sized,
    {
        *self.0.get_or_init(|| {
            let native = detect_native_support(platform);
            log::debug!("native WebP export support: {}", native);
            native
        })
    }
}

static PROCESS_FLAG: CapabilityFlag = CapabilityFlag::new();

/// The process-wide capability flag.
pub fn process_flag() -> &'static CapabilityFlag {
    &PROCESS_FLAG
}
