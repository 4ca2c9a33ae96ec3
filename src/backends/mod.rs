// SPDX-License-Identifier: GPL-3.0-only

//! Frame source backends
//!
//! - [`camera`]: live cameras through the `CameraDriver` boundary (V4L2)
//! - [`file_source`]: single still images loaded from disk or memory

pub mod camera;
pub mod file_source;

pub use camera::{CameraDriver, FrameSource, LiveCamera, V4l2Driver};
pub use file_source::StillImageSource;
