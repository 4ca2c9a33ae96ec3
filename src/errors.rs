// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Top-level error used by the command-line front end
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera device errors
    Device(DeviceError),
    /// Pipeline lifecycle errors
    Pipeline(PipelineError),
    /// Configuration errors
    Config(ConfigError),
    /// Filesystem errors
    Io(String),
    /// Generic error with message
    Other(String),
}

/// Errors that prevent a frame source from opening
///
/// These are the only errors `DetectionPipeline::start` reports. Once a
/// session is running, device trouble is logged and absorbed instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No device (or file) to open
    Unavailable(String),
    /// The device exists but refused to open (busy, permissions, driver)
    OpenFailed(String),
}

/// Transient per-capture failures reported by a camera driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The device produced an unusable buffer this time
    Transient(String),
    /// The device went away mid-session
    Disconnected(String),
    /// Capture attempted while the device is closed
    NotOpen,
}

/// Outcome of a single decode attempt that did not produce a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No code in this image; the expected, silent case
    NotFound,
    /// The decoder failed unexpectedly
    Fault(String),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read
    Io(String),
    /// Config file is not valid JSON for the schema
    Parse(String),
    /// A value is out of range
    Invalid(String),
}

/// Errors returned by `DetectionPipeline::start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The frame source could not be opened
    Device(DeviceError),
    /// The configuration was rejected
    Config(ConfigError),
    /// `start` called while a session is active
    AlreadyRunning,
    /// A worker thread could not be spawned
    Spawn(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Device(e) => write!(f, "Device error: {}", e),
            AppError::Pipeline(e) => write!(f, "Pipeline error: {}", e),
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Unavailable(msg) => write!(f, "Device unavailable: {}", msg),
            DeviceError::OpenFailed(msg) => write!(f, "Failed to open device: {}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Transient(msg) => write!(f, "Capture failed: {}", msg),
            CaptureError::Disconnected(msg) => write!(f, "Device disconnected: {}", msg),
            CaptureError::NotOpen => write!(f, "Device is not open"),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::NotFound => write!(f, "No barcode found"),
            DecodeError::Fault(msg) => write!(f, "Decoder fault: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Failed to read config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Device(e) => write!(f, "{}", e),
            PipelineError::Config(e) => write!(f, "{}", e),
            PipelineError::AlreadyRunning => write!(f, "Scanning is already running"),
            PipelineError::Spawn(msg) => write!(f, "Failed to start worker thread: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for DeviceError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for PipelineError {}

impl From<DeviceError> for PipelineError {
    fn from(err: DeviceError) -> Self {
        PipelineError::Device(err)
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Config(err)
    }
}

impl From<DeviceError> for AppError {
    fn from(err: DeviceError) -> Self {
        AppError::Device(err)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Device(e) => AppError::Device(e),
            other => AppError::Pipeline(other),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
