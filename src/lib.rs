// SPDX-License-Identifier: GPL-3.0-only

//! Barcode scanner - camera frame acquisition and barcode detection
//!
//! Frames flow from a camera (or a still image) through a single-slot
//! buffer into a cascade of decode strategies. Repeated reads of the same
//! code are suppressed for a cooldown window and everything else is handed
//! to a caller-supplied sink.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Frame sources (V4L2 cameras, still images)
//! - [`decode`]: Preprocessing, strategy cascade, decoder boundary
//! - [`pipeline`]: Capture and poll loops, deduplication, sink contract
//! - [`config`]: Session configuration
//!
//! # Example
//!
//! ```ignore
//! use barcode_scanner::{DetectionEvent, DetectionPipeline, LiveCamera, PipelineConfig, V4l2Driver};
//!
//! let pipeline = DetectionPipeline::new(|event: DetectionEvent| println!("{}", event.payload));
//! pipeline.start(Box::new(LiveCamera::new(V4l2Driver::new(), None)), PipelineConfig::default())?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod decode;
pub mod errors;
pub mod pipeline;

// Re-export commonly used types
pub use backends::camera::types::{Frame, PixelFormat, Resolution};
pub use backends::{CameraDriver, FrameSource, LiveCamera, StillImageSource, V4l2Driver};
pub use config::PipelineConfig;
pub use decode::{DecodeOutcome, DecodeStrategyChain, Decoded, Decoder, RqrrDecoder, RxingDecoder, Strategy, Symbology};
pub use errors::{AppError, AppResult, DeviceError, PipelineError};
pub use pipeline::{ChannelSink, DetectionEvent, DetectionPipeline, DetectionSink, PipelineState, StatsSnapshot};
