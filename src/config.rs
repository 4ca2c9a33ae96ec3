// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::types::Resolution;
use crate::constants::{decode, paths, timing};
use crate::decode::{Strategy, Symbology};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Settings for one scanning session
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How often the poll loop looks at the latest frame
    pub poll_interval_ms: u64,
    /// Minimum gap between two events for the same payload
    pub cooldown_ms: u64,
    /// Pacing of the capture loop
    pub capture_interval_ms: u64,
    /// Resolution requested from the camera
    pub resolution: Resolution,
    /// Camera to open, by enumeration order; `None` picks the first one
    pub device_index: Option<usize>,
    /// Decode strategies to run (always tried in canonical order)
    pub enabled_strategies: Vec<Strategy>,
    /// Symbologies the decoder should look for
    pub enabled_symbologies: Vec<Symbology>,
    /// Gain of the contrast stretch used by the enhanced strategy
    pub contrast_gain: f32,
    /// Frames larger than this on either side are downscaled before decoding
    pub max_decode_dimension: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: timing::POLL_INTERVAL_MS,
            cooldown_ms: timing::COOLDOWN_MS,
            capture_interval_ms: timing::CAPTURE_INTERVAL_MS,
            resolution: Resolution::default(),
            device_index: None,
            enabled_strategies: Strategy::ALL.to_vec(),
            enabled_symbologies: Symbology::ALL.to_vec(),
            contrast_gain: decode::CONTRAST_GAIN,
            max_decode_dimension: decode::MAX_DECODE_DIMENSION,
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be greater than 0".into()));
        }
        if self.capture_interval_ms == 0 {
            return Err(ConfigError::Invalid("capture_interval_ms must be greater than 0".into()));
        }
        if self.enabled_strategies.is_empty() {
            return Err(ConfigError::Invalid("at least one decode strategy must be enabled".into()));
        }
        if self.enabled_symbologies.is_empty() {
            return Err(ConfigError::Invalid("at least one symbology must be enabled".into()));
        }
        if !(self.contrast_gain.is_finite() && self.contrast_gain > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "contrast_gain must be positive, got {}",
                self.contrast_gain
            )));
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(ConfigError::Invalid(format!("invalid resolution {}", self.resolution)));
        }
        if self.max_decode_dimension == 0 {
            return Err(ConfigError::Invalid("max_decode_dimension must be greater than 0".into()));
        }
        Ok(())
    }

    /// Parse a JSON document; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json(&contents)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load the file at `default_path()`, or defaults if there is none
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// `<config dir>/barcode-scanner/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(paths::CONFIG_DIR_NAME).join(paths::CONFIG_FILE_NAME))
    }
}
