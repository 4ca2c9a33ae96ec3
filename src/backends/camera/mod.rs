// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  DetectionPipeline  │  ← capture loop thread owns the source
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  FrameSource Trait  │  ← open / capture_frame / close
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴───────────────┐
//!      ▼                     ▼
//! ┌──────────────┐   ┌──────────────────┐
//! │ LiveCamera<D>│   │ StillImageSource │
//! └──────┬───────┘   └──────────────────┘
//!        ▼
//! ┌──────────────┐
//! │ CameraDriver │  ← V4L2 (or a test double)
//! └──────────────┘
//! ```

pub mod frame_loop;
pub mod types;
pub mod v4l2;

pub use frame_loop::{LoopAction, LoopController, StopSignal};
pub use types::*;
pub use v4l2::V4l2Driver;

use crate::errors::{CaptureError, DeviceError};
use tracing::{debug, info, warn};

/// Anything that can feed frames into the detection pipeline
///
/// A source is owned by exactly one thread at a time: `open` runs on the
/// caller of `DetectionPipeline::start`, after which the source moves to the
/// capture thread for `capture_frame` and the final `close`.
pub trait FrameSource: Send {
    /// Open the device, negotiating the resolution closest to `preferred`
    fn open(&mut self, preferred: Resolution) -> Result<DeviceHandle, DeviceError>;

    /// Capture one frame, or `None` if nothing was produced this call
    fn capture_frame(&mut self) -> Option<Frame>;

    /// Release the device. Idempotent and safe if never opened.
    fn close(&mut self);

    /// True once the source will never produce another frame
    fn end_of_stream(&self) -> bool {
        false
    }

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Low-level camera library boundary
pub trait CameraDriver: Send {
    /// List cameras present on the system
    fn enumerate_devices(&self) -> Vec<DeviceDescriptor>;

    /// Discrete resolutions a device supports
    fn list_resolutions(&self, device: &DeviceDescriptor) -> Result<Vec<Resolution>, DeviceError>;

    /// Open a device at an exact resolution, returning the one negotiated
    fn open(&mut self, device: &DeviceDescriptor, resolution: Resolution) -> Result<Resolution, DeviceError>;

    /// Grab the next frame from the open device
    fn capture(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Close the open device, if any
    fn close(&mut self);
}

/// Pick the resolution to request from a device
///
/// Exact match first, else the largest available; with nothing advertised
/// the preferred resolution is passed through and the driver decides.
pub fn select_resolution(preferred: Resolution, available: &[Resolution]) -> Resolution {
    if available.contains(&preferred) {
        return preferred;
    }

    available
        .iter()
        .copied()
        .max_by_key(|r| r.area())
        .unwrap_or(preferred)
}

/// Live camera frame source on top of a `CameraDriver`
pub struct LiveCamera<D: CameraDriver> {
    driver: D,
    /// Position in the driver's enumeration; `None` means first camera
    device_index: Option<usize>,
    handle: Option<DeviceHandle>,
    name: String,
    consecutive_failures: u32,
}

impl<D: CameraDriver> LiveCamera<D> {
    pub fn new(driver: D, device_index: Option<usize>) -> Self {
        Self {
            driver,
            device_index,
            handle: None,
            name: "camera".to_string(),
            consecutive_failures: 0,
        }
    }

    /// The negotiated device and resolution while open
    pub fn handle(&self) -> Option<&DeviceHandle> {
        self.handle.as_ref()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl<D: CameraDriver> FrameSource for LiveCamera<D> {
    fn open(&mut self, preferred: Resolution) -> Result<DeviceHandle, DeviceError> {
        if let Some(handle) = &self.handle {
            return Ok(handle.clone());
        }

        let devices = self.driver.enumerate_devices();
        if devices.is_empty() {
            return Err(DeviceError::Unavailable("No cameras found".to_string()));
        }

        let index = self.device_index.unwrap_or(0);
        let device = devices.get(index).cloned().ok_or_else(|| {
            DeviceError::Unavailable(format!(
                "Camera index {} out of range (0-{})",
                index,
                devices.len() - 1
            ))
        })?;

        let available = self.driver.list_resolutions(&device).unwrap_or_else(|e| {
            debug!(device = %device.name, error = %e, "Could not list resolutions");
            Vec::new()
        });
        let requested = select_resolution(preferred, &available);
        debug!(
            device = %device.name,
            %preferred,
            %requested,
            available = available.len(),
            "Selected capture resolution"
        );

        let resolution = self.driver.open(&device, requested)?;
        info!(device = %device.name, path = %device.path, %resolution, "Camera opened");

        self.name = device.name.clone();
        self.consecutive_failures = 0;
        let handle = DeviceHandle { device, resolution };
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    fn capture_frame(&mut self) -> Option<Frame> {
        self.handle.as_ref()?;

        match self.driver.capture() {
            Ok(Some(frame)) => {
                if self.consecutive_failures > 0 {
                    info!(
                        device = %self.name,
                        failures = self.consecutive_failures,
                        "Camera capture recovered"
                    );
                }
                self.consecutive_failures = 0;
                Some(frame)
            }
            Ok(None) => None,
            Err(e) => {
                self.consecutive_failures += 1;
                // Log the first failure of a streak, then stay quiet
                if self.consecutive_failures == 1 {
                    warn!(device = %self.name, error = %e, "Camera capture failed");
                } else {
                    debug!(
                        device = %self.name,
                        error = %e,
                        failures = self.consecutive_failures,
                        "Camera capture still failing"
                    );
                }
                None
            }
        }
    }

    fn close(&mut self) {
        if self.handle.take().is_some() {
            self.driver.close();
            info!(device = %self.name, "Camera closed");
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<D: CameraDriver> Drop for LiveCamera<D> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FakeDriver {
        devices: Vec<DeviceDescriptor>,
        resolutions: Vec<Resolution>,
        refuse_open: bool,
        opened_at: Option<Resolution>,
        captures: Vec<Result<Option<Frame>, CaptureError>>,
        closes: Arc<AtomicU32>,
    }

    impl FakeDriver {
        fn with_camera(resolutions: Vec<Resolution>) -> Self {
            Self {
                devices: vec![DeviceDescriptor {
                    name: "Fake Cam".to_string(),
                    path: "/dev/video0".to_string(),
                    index: 0,
                }],
                resolutions,
                refuse_open: false,
                opened_at: None,
                captures: Vec::new(),
                closes: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    impl CameraDriver for FakeDriver {
        fn enumerate_devices(&self) -> Vec<DeviceDescriptor> {
            self.devices.clone()
        }

        fn list_resolutions(&self, _device: &DeviceDescriptor) -> Result<Vec<Resolution>, DeviceError> {
            Ok(self.resolutions.clone())
        }

        fn open(&mut self, _device: &DeviceDescriptor, resolution: Resolution) -> Result<Resolution, DeviceError> {
            if self.refuse_open {
                return Err(DeviceError::OpenFailed("busy".to_string()));
            }
            self.opened_at = Some(resolution);
            Ok(resolution)
        }

        fn capture(&mut self) -> Result<Option<Frame>, CaptureError> {
            if self.captures.is_empty() {
                Ok(None)
            } else {
                self.captures.remove(0)
            }
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_select_resolution_prefers_exact_match() {
        let available = [Resolution::new(1920, 1080), Resolution::new(640, 480)];
        assert_eq!(
            select_resolution(Resolution::new(640, 480), &available),
            Resolution::new(640, 480)
        );
    }

    #[test]
    fn test_select_resolution_falls_back_to_largest() {
        let available = [
            Resolution::new(320, 240),
            Resolution::new(1280, 720),
            Resolution::new(800, 600),
        ];
        assert_eq!(
            select_resolution(Resolution::new(1024, 768), &available),
            Resolution::new(1280, 720)
        );
    }

    #[test]
    fn test_select_resolution_without_list_passes_through() {
        assert_eq!(
            select_resolution(Resolution::new(640, 480), &[]),
            Resolution::new(640, 480)
        );
    }

    #[test]
    fn test_open_without_devices_is_unavailable() {
        let mut driver = FakeDriver::with_camera(Vec::new());
        driver.devices.clear();
        let mut camera = LiveCamera::new(driver, None);

        let err = camera.open(Resolution::default()).unwrap_err();
        assert!(matches!(err, DeviceError::Unavailable(_)));
    }

    #[test]
    fn test_open_index_out_of_range_is_unavailable() {
        let mut camera = LiveCamera::new(FakeDriver::with_camera(Vec::new()), Some(3));
        let err = camera.open(Resolution::default()).unwrap_err();
        assert!(matches!(err, DeviceError::Unavailable(_)));
    }

    #[test]
    fn test_open_refused_is_open_failed() {
        let mut driver = FakeDriver::with_camera(Vec::new());
        driver.refuse_open = true;
        let mut camera = LiveCamera::new(driver, None);

        let err = camera.open(Resolution::default()).unwrap_err();
        assert_eq!(err, DeviceError::OpenFailed("busy".to_string()));
        assert!(camera.handle().is_none());
    }

    #[test]
    fn test_open_negotiates_largest_when_no_exact_match() {
        let driver = FakeDriver::with_camera(vec![Resolution::new(1280, 720), Resolution::new(320, 240)]);
        let mut camera = LiveCamera::new(driver, None);

        let handle = camera.open(Resolution::new(640, 480)).unwrap();
        assert_eq!(handle.resolution, Resolution::new(1280, 720));
        assert_eq!(camera.name(), "Fake Cam");
    }

    #[test]
    fn test_capture_errors_are_transient() {
        let mut driver = FakeDriver::with_camera(Vec::new());
        driver.captures = vec![
            Err(CaptureError::Transient("bad buffer".to_string())),
            Ok(Some(Frame::gray(1, 1, vec![0]))),
        ];
        let mut camera = LiveCamera::new(driver, None);
        camera.open(Resolution::default()).unwrap();

        assert!(camera.capture_frame().is_none());
        assert!(camera.capture_frame().is_some());
    }

    #[test]
    fn test_capture_before_open_yields_nothing() {
        let mut driver = FakeDriver::with_camera(Vec::new());
        driver.captures = vec![Ok(Some(Frame::gray(1, 1, vec![0])))];
        let mut camera = LiveCamera::new(driver, None);
        assert!(camera.capture_frame().is_none());
    }

    #[test]
    fn test_close_is_idempotent() {
        let driver = FakeDriver::with_camera(Vec::new());
        let closes = Arc::clone(&driver.closes);
        let mut camera = LiveCamera::new(driver, None);

        camera.close(); // never opened
        camera.open(Resolution::default()).unwrap();
        camera.close();
        camera.close();
        drop(camera);

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
