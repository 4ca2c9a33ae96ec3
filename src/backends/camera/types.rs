// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for frame sources

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Capture resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count, used to rank resolutions
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(
            crate::constants::formats::DEFAULT_WIDTH,
            crate::constants::formats::DEFAULT_HEIGHT,
        )
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A camera as reported by a driver's enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Human readable name (V4L2 card name)
    pub name: String,
    /// Path used to open the device (e.g. /dev/video0)
    pub path: String,
    /// Driver-side index
    pub index: usize,
}

/// An opened source: which device and which resolution was negotiated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub device: DeviceDescriptor,
    pub resolution: Resolution,
}

/// Pixel layout of frame data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit luminance, one byte per pixel
    Gray8,
    /// 24-bit RGB, three bytes per pixel
    Rgb24,
    /// 32-bit RGBA, four bytes per pixel
    Rgba,
    /// Packed 4:2:2 (Y0 U Y1 V), two bytes per pixel
    Yuyv,
}

impl PixelFormat {
    /// Average bytes per pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::Gray8 => 1,
            Self::Rgb24 => 3,
            Self::Rgba => 4,
            Self::Yuyv => 2,
        }
    }
}

/// A single captured image
///
/// Frames are immutable once published; consumers share them as
/// `Arc<Frame>` and derive copies for any processing.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Pixel bytes, row-major, `stride` bytes per row
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// When the source captured the frame
    pub captured_at: Instant,
    /// Assigned by `FrameBuffer::publish`; 0 for frames never published
    pub sequence: u64,
}

impl Frame {
    /// Create a tightly packed frame stamped with the current time
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format,
            stride: width * format.bytes_per_pixel(),
            captured_at: Instant::now(),
            sequence: 0,
        }
    }

    /// Create an 8-bit greyscale frame
    pub fn gray(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::new(width, height, PixelFormat::Gray8, data)
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Check that the buffer holds `height` rows of `stride` bytes
    pub fn is_complete(&self) -> bool {
        let row_bytes = self.width as usize * self.format.bytes_per_pixel() as usize;
        self.stride as usize >= row_bytes
            && self.data.len() >= self.stride as usize * self.height.saturating_sub(1) as usize + row_bytes
    }
}
