// SPDX-License-Identifier: GPL-3.0-only

//! Video4Linux2 camera driver
//!
//! Talks to `/dev/video*` nodes through the `v4l` crate. YUYV is requested
//! first because it carries luminance directly; MJPG is accepted as a
//! fallback and decoded with the `image` crate.

use super::types::{DeviceDescriptor, Frame, PixelFormat, Resolution};
use super::CameraDriver;
use crate::constants::formats::{PREFERRED_FOURCCS, V4L2_BUFFER_COUNT};
use crate::errors::{CaptureError, DeviceError};
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};
use v4l::buffer::Type;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// errno for a device that vanished (unplugged)
const ENODEV: i32 = 19;

/// Resolutions probed when a device advertises a stepwise range
const STEPWISE_CANDIDATES: &[(u32, u32)] = &[(1920, 1080), (1280, 720), (640, 480), (320, 240)];

/// An open device with its running capture stream
struct OpenDevice {
    // Field order matters: the stream unmaps its buffers before the device closes
    stream: Stream<'static>,
    _device: Device,
    format: Format,
}

/// Camera driver backed by V4L2
#[derive(Default)]
pub struct V4l2Driver {
    open: Option<OpenDevice>,
}

impl V4l2Driver {
    pub fn new() -> Self {
        Self::default()
    }
}

fn preferred_fourccs() -> impl Iterator<Item = FourCC> {
    PREFERRED_FOURCCS.iter().map(|code| FourCC::new(code))
}

fn map_open_error(path: &str, err: io::Error) -> DeviceError {
    match err.kind() {
        io::ErrorKind::NotFound => DeviceError::Unavailable(format!("{}: {}", path, err)),
        _ => DeviceError::OpenFailed(format!("{}: {}", path, err)),
    }
}

impl CameraDriver for V4l2Driver {
    fn enumerate_devices(&self) -> Vec<DeviceDescriptor> {
        let mut devices: Vec<DeviceDescriptor> = v4l::context::enum_devices()
            .into_iter()
            .filter(|node| {
                // Metadata nodes show up alongside capture nodes; keep only
                // those that offer a pixel format we can consume
                Device::with_path(node.path())
                    .and_then(|dev| dev.enum_formats())
                    .map(|formats| {
                        formats
                            .iter()
                            .any(|f| preferred_fourccs().any(|code| code == f.fourcc))
                    })
                    .unwrap_or(false)
            })
            .map(|node| DeviceDescriptor {
                name: node
                    .name()
                    .unwrap_or_else(|| format!("Video device {}", node.index())),
                path: node.path().to_string_lossy().to_string(),
                index: node.index(),
            })
            .collect();

        devices.sort_by_key(|d| d.index);
        debug!(count = devices.len(), "Enumerated V4L2 devices");
        devices
    }

    fn list_resolutions(&self, device: &DeviceDescriptor) -> Result<Vec<Resolution>, DeviceError> {
        let dev = Device::with_path(&device.path).map_err(|e| map_open_error(&device.path, e))?;

        let mut resolutions = Vec::new();
        for fourcc in preferred_fourccs() {
            let Ok(sizes) = dev.enum_framesizes(fourcc) else {
                continue;
            };
            for size in sizes {
                match size.size {
                    FrameSizeEnum::Discrete(discrete) => {
                        resolutions.push(Resolution::new(discrete.width, discrete.height));
                    }
                    FrameSizeEnum::Stepwise(step) => {
                        for &(w, h) in STEPWISE_CANDIDATES {
                            if w >= step.min_width
                                && w <= step.max_width
                                && h >= step.min_height
                                && h <= step.max_height
                            {
                                resolutions.push(Resolution::new(w, h));
                            }
                        }
                    }
                }
            }
        }

        resolutions.sort_by_key(|r| std::cmp::Reverse(r.area()));
        resolutions.dedup();
        Ok(resolutions)
    }

    fn open(&mut self, device: &DeviceDescriptor, resolution: Resolution) -> Result<Resolution, DeviceError> {
        self.close();

        let dev = Device::with_path(&device.path).map_err(|e| map_open_error(&device.path, e))?;

        let mut negotiated = None;
        for fourcc in preferred_fourccs() {
            let requested = Format::new(resolution.width, resolution.height, fourcc);
            match dev.set_format(&requested) {
                Ok(actual) if actual.fourcc == fourcc => {
                    negotiated = Some(actual);
                    break;
                }
                Ok(actual) => {
                    debug!(requested = ?fourcc, actual = ?actual.fourcc, "Driver substituted pixel format");
                }
                Err(e) => {
                    debug!(fourcc = ?fourcc, error = %e, "Pixel format rejected");
                }
            }
        }

        let format = negotiated.ok_or_else(|| {
            DeviceError::OpenFailed(format!("{}: no supported pixel format (YUYV/MJPG)", device.path))
        })?;

        let stream = Stream::with_buffers(&dev, Type::VideoCapture, V4L2_BUFFER_COUNT)
            .map_err(|e| DeviceError::OpenFailed(format!("Failed to create stream: {}", e)))?;

        info!(
            path = %device.path,
            width = format.width,
            height = format.height,
            fourcc = ?format.fourcc,
            "V4L2 format configured"
        );

        let negotiated = Resolution::new(format.width, format.height);
        self.open = Some(OpenDevice {
            stream,
            _device: dev,
            format,
        });
        Ok(negotiated)
    }

    fn capture(&mut self) -> Result<Option<Frame>, CaptureError> {
        let open = self.open.as_mut().ok_or(CaptureError::NotOpen)?;

        let (buf, meta) = open.stream.next().map_err(|e| {
            if e.raw_os_error() == Some(ENODEV) {
                CaptureError::Disconnected(e.to_string())
            } else {
                CaptureError::Transient(e.to_string())
            }
        })?;
        let captured_at = Instant::now();

        let used = (meta.bytesused as usize).min(buf.len());
        if used == 0 {
            return Ok(None);
        }
        let buf = &buf[..used];
        let format = &open.format;
        trace!(bytes = used, sequence = meta.sequence, "V4L2 buffer dequeued");

        if format.fourcc == FourCC::new(b"YUYV") {
            let stride = format.stride.max(format.width * 2);
            let needed = stride as usize * format.height as usize;
            if buf.len() < needed {
                return Err(CaptureError::Transient(format!(
                    "short YUYV buffer: {} of {} bytes",
                    buf.len(),
                    needed
                )));
            }
            return Ok(Some(Frame {
                width: format.width,
                height: format.height,
                data: Arc::from(&buf[..needed]),
                format: PixelFormat::Yuyv,
                stride,
                captured_at,
                sequence: 0,
            }));
        }

        let decoded = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)
            .map_err(|e| CaptureError::Transient(format!("MJPG decode failed: {}", e)))?
            .to_rgb8();
        let (width, height) = decoded.dimensions();
        let mut frame = Frame::new(width, height, PixelFormat::Rgb24, decoded.into_raw());
        frame.captured_at = captured_at;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if let Some(open) = self.open.take() {
            debug!(fourcc = ?open.format.fourcc, "Closing V4L2 stream");
        }
    }
}
