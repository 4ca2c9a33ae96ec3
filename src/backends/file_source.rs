// SPDX-License-Identifier: GPL-3.0-only

//! Still image frame source
//!
//! Substitutes for a camera when scanning a picture from disk: the image is
//! loaded on `open`, delivered once, and the source then reports end of
//! stream.

use crate::backends::camera::types::{DeviceDescriptor, DeviceHandle, Frame, PixelFormat, Resolution};
use crate::backends::camera::FrameSource;
use crate::constants::file_formats;
use crate::errors::DeviceError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load an image file as an RGB frame
pub fn load_image_as_frame(path: &Path) -> Result<Frame, DeviceError> {
    if !path.exists() {
        return Err(DeviceError::Unavailable(format!(
            "Image not found: {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !file_formats::is_image_extension(&extension) {
        return Err(DeviceError::OpenFailed(format!(
            "Unsupported file format: {}",
            extension
        )));
    }

    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        DeviceError::OpenFailed(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    info!(width, height, "Image loaded successfully");

    Ok(Frame::new(width, height, PixelFormat::Rgb24, rgb.into_raw()))
}

enum Origin {
    File(PathBuf),
    Memory(Frame),
}

/// Frame source that yields a single still image
pub struct StillImageSource {
    origin: Origin,
    pending: Option<Frame>,
    delivered: bool,
    is_open: bool,
    name: String,
}

impl StillImageSource {
    /// Source reading `path` when opened
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            origin: Origin::File(path),
            pending: None,
            delivered: false,
            is_open: false,
            name,
        }
    }

    /// Source wrapping an already decoded frame
    pub fn from_frame(frame: Frame) -> Self {
        Self {
            origin: Origin::Memory(frame),
            pending: None,
            delivered: false,
            is_open: false,
            name: "still image".to_string(),
        }
    }
}

impl FrameSource for StillImageSource {
    fn open(&mut self, _preferred: Resolution) -> Result<DeviceHandle, DeviceError> {
        let (frame, path) = match &self.origin {
            Origin::File(path) => (load_image_as_frame(path)?, path.display().to_string()),
            Origin::Memory(frame) => (frame.clone(), String::new()),
        };

        let handle = DeviceHandle {
            device: DeviceDescriptor {
                name: self.name.clone(),
                path,
                index: 0,
            },
            resolution: frame.resolution(),
        };

        self.pending = Some(frame);
        self.delivered = false;
        self.is_open = true;
        Ok(handle)
    }

    fn capture_frame(&mut self) -> Option<Frame> {
        if !self.is_open {
            return None;
        }
        let mut frame = self.pending.take()?;
        frame.captured_at = std::time::Instant::now();
        self.delivered = true;
        debug!(source = %self.name, "Delivered still image");
        Some(frame)
    }

    fn close(&mut self) {
        self.pending = None;
        self.is_open = false;
    }

    fn end_of_stream(&self) -> bool {
        self.delivered
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_yields_once() {
        let mut source = StillImageSource::from_frame(Frame::gray(2, 2, vec![0, 255, 255, 0]));
        let handle = source.open(Resolution::default()).unwrap();
        assert_eq!(handle.resolution, Resolution::new(2, 2));

        assert!(!source.end_of_stream());
        assert!(source.capture_frame().is_some());
        assert!(source.end_of_stream());
        assert!(source.capture_frame().is_none());
    }

    #[test]
    fn test_capture_before_open_yields_nothing() {
        let mut source = StillImageSource::from_frame(Frame::gray(1, 1, vec![0]));
        assert!(source.capture_frame().is_none());
        source.close();
        source.close();
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let mut source = StillImageSource::from_path("/nonexistent/barcode.png");
        let err = source.open(Resolution::default()).unwrap_err();
        assert!(matches!(err, DeviceError::Unavailable(_)));
    }

    #[test]
    fn test_png_round_trip_from_disk() {
        let path = std::env::temp_dir().join(format!("still-source-{}.png", uuid::Uuid::new_v4()));
        let img = image::GrayImage::from_fn(8, 4, |x, _| image::Luma([if x < 4 { 0 } else { 255 }]));
        img.save(&path).unwrap();

        let mut source = StillImageSource::from_path(&path);
        let handle = source.open(Resolution::default()).unwrap();
        let frame = source.capture_frame().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(handle.resolution, Resolution::new(8, 4));
        assert_eq!(frame.format, PixelFormat::Rgb24);
        assert_eq!(&frame.data[0..3], &[0, 0, 0]);
        assert_eq!(&frame.data[7 * 3..8 * 3], &[255, 255, 255]);
    }

    #[test]
    fn test_unreadable_image_is_open_failed() {
        let path = std::env::temp_dir().join(format!("still-source-{}.png", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"not a png").unwrap();

        let mut source = StillImageSource::from_path(&path);
        let err = source.open(Resolution::default()).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, DeviceError::OpenFailed(_)));
    }
}
