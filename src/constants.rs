// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Scanning cadence defaults
pub mod timing {
    use super::Duration;

    /// Time between decode attempts (poll loop period)
    pub const POLL_INTERVAL_MS: u64 = 100;

    /// Minimum time before an identical payload may fire again
    pub const COOLDOWN_MS: u64 = 2000;

    /// Capture loop period (~30 FPS)
    pub const CAPTURE_INTERVAL_MS: u64 = 33;

    /// Log a capture heartbeat every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 300;

    /// Upper bound the CLI waits for a still image to produce a detection
    pub const STILL_IMAGE_TIMEOUT: Duration = Duration::from_secs(2);
}

/// Camera format defaults
pub mod formats {
    /// Preferred capture width when nothing is configured
    pub const DEFAULT_WIDTH: u32 = 640;

    /// Preferred capture height when nothing is configured
    pub const DEFAULT_HEIGHT: u32 = 480;

    /// Number of mmap buffers requested from V4L2
    pub const V4L2_BUFFER_COUNT: u32 = 4;

    /// FourCC codes tried in order when configuring a V4L2 device
    pub const PREFERRED_FOURCCS: &[&[u8; 4]] = &[b"YUYV", b"MJPG"];
}

/// Decode preprocessing parameters
pub mod decode {
    /// Gain applied by the contrast-stretch strategy
    pub const CONTRAST_GAIN: f32 = 1.5;

    /// Pivot of the contrast stretch (mid grey)
    pub const CONTRAST_PIVOT: f32 = 128.0;

    /// Frames larger than this (either side) are downscaled before decoding
    pub const MAX_DECODE_DIMENSION: u32 = 1280;

    /// Histogram buckets used by the global threshold (256 >> 3)
    pub const LUMINANCE_BUCKETS: usize = 32;

    /// Bits discarded when bucketing luminance
    pub const LUMINANCE_SHIFT: u32 = 3;
}

/// Supported still image file formats
pub mod file_formats {
    /// Image file extensions accepted by the still image source
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff"];

    /// Check if an extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Config file location
pub mod paths {
    /// Directory under the user config dir
    pub const CONFIG_DIR_NAME: &str = "barcode-scanner";

    /// Config file name
    pub const CONFIG_FILE_NAME: &str = "config.json";
}
