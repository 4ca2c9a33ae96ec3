// SPDX-License-Identifier: GPL-3.0-only

//! Barcode decoding
//!
//! A frame is converted to luminance once, then handed to each enabled
//! strategy in a fixed order until one of them reads a code:
//!
//! | Strategy          | Image               | Binarizer        |
//! |-------------------|---------------------|------------------|
//! | `Standard`        | luminance as is     | adaptive         |
//! | `GlobalHistogram` | luminance as is     | global histogram |
//! | `Enhanced`        | contrast stretched  | adaptive         |
//!
//! Failures of any kind inside a strategy, including a panicking decoder,
//! count as "nothing found" and the chain moves on.

pub mod decoder;
pub mod preprocess;

pub use decoder::{Binarizer, DecodedSymbol, Decoder, RqrrDecoder, RxingDecoder};
pub use preprocess::LumaImage;

use crate::backends::camera::types::Frame;
use crate::config::PipelineConfig;
use crate::errors::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// One way of preparing and decoding a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Standard,
    GlobalHistogram,
    Enhanced,
}

impl Strategy {
    /// All strategies in the order they are tried
    pub const ALL: [Strategy; 3] = [Self::Standard, Self::GlobalHistogram, Self::Enhanced];

    /// Position in `ALL`, used to index per-strategy counters
    pub fn index(&self) -> usize {
        match self {
            Self::Standard => 0,
            Self::GlobalHistogram => 1,
            Self::Enhanced => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::GlobalHistogram => "global_histogram",
            Self::Enhanced => "enhanced",
        }
    }

    /// Name shown to users
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::GlobalHistogram => "Global",
            Self::Enhanced => "Enhanced",
        }
    }

    /// Deduplicate `enabled` and put it in canonical order
    pub fn canonical(enabled: &[Strategy]) -> Vec<Strategy> {
        Self::ALL.into_iter().filter(|s| enabled.contains(s)).collect()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "standard" => Ok(Self::Standard),
            "global" | "global_histogram" => Ok(Self::GlobalHistogram),
            "enhanced" => Ok(Self::Enhanced),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// Barcode symbologies a scanner can be asked to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbology {
    #[serde(rename = "QR_CODE")]
    QrCode,
    #[serde(rename = "CODE_128")]
    Code128,
    #[serde(rename = "CODE_39")]
    Code39,
    #[serde(rename = "CODE_93")]
    Code93,
    #[serde(rename = "EAN_13")]
    Ean13,
    #[serde(rename = "EAN_8")]
    Ean8,
    #[serde(rename = "UPC_A")]
    UpcA,
    #[serde(rename = "UPC_E")]
    UpcE,
    #[serde(rename = "CODABAR")]
    Codabar,
    #[serde(rename = "ITF")]
    Itf,
    #[serde(rename = "RSS_14")]
    Rss14,
    #[serde(rename = "RSS_EXPANDED")]
    RssExpanded,
    #[serde(rename = "DATA_MATRIX")]
    DataMatrix,
    #[serde(rename = "PDF_417")]
    Pdf417,
    #[serde(rename = "AZTEC")]
    Aztec,
    #[serde(rename = "MAXICODE")]
    MaxiCode,
}

impl Symbology {
    pub const ALL: [Symbology; 16] = [
        Self::QrCode,
        Self::Code128,
        Self::Code39,
        Self::Code93,
        Self::Ean13,
        Self::Ean8,
        Self::UpcA,
        Self::UpcE,
        Self::Codabar,
        Self::Itf,
        Self::Rss14,
        Self::RssExpanded,
        Self::DataMatrix,
        Self::Pdf417,
        Self::Aztec,
        Self::MaxiCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QrCode => "QR_CODE",
            Self::Code128 => "CODE_128",
            Self::Code39 => "CODE_39",
            Self::Code93 => "CODE_93",
            Self::Ean13 => "EAN_13",
            Self::Ean8 => "EAN_8",
            Self::UpcA => "UPC_A",
            Self::UpcE => "UPC_E",
            Self::Codabar => "CODABAR",
            Self::Itf => "ITF",
            Self::Rss14 => "RSS_14",
            Self::RssExpanded => "RSS_EXPANDED",
            Self::DataMatrix => "DATA_MATRIX",
            Self::Pdf417 => "PDF_417",
            Self::Aztec => "AZTEC",
            Self::MaxiCode => "MAXICODE",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbology {
    type Err = String;

    /// Accepts `QR_CODE`, `qr-code`, `qrcode` and similar spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|sym| sym.as_str().replace('_', "") == wanted)
            .ok_or_else(|| format!("unknown symbology '{}'", s))
    }
}

/// A successful decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub payload: String,
    pub symbology: Symbology,
    /// The strategy that produced the payload
    pub strategy: Strategy,
}

/// Result of running the chain over one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Decoded(Decoded),
    NotFound,
}

impl DecodeOutcome {
    pub fn decoded(self) -> Option<Decoded> {
        match self {
            Self::Decoded(decoded) => Some(decoded),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Decoded(_))
    }
}

/// Ordered list of decode strategies over one decoder
pub struct DecodeStrategyChain {
    decoder: Arc<dyn Decoder>,
    strategies: Vec<Strategy>,
    symbologies: Vec<Symbology>,
    contrast_gain: f32,
    max_dimension: u32,
}

impl DecodeStrategyChain {
    /// Chain with every strategy and symbology enabled
    pub fn new(decoder: Arc<dyn Decoder>) -> Self {
        Self {
            decoder,
            strategies: Strategy::ALL.to_vec(),
            symbologies: Symbology::ALL.to_vec(),
            contrast_gain: crate::constants::decode::CONTRAST_GAIN,
            max_dimension: crate::constants::decode::MAX_DECODE_DIMENSION,
        }
    }

    /// Chain configured from pipeline settings
    pub fn from_config(decoder: Arc<dyn Decoder>, config: &PipelineConfig) -> Self {
        let unreadable: Vec<Symbology> = config
            .enabled_symbologies
            .iter()
            .copied()
            .filter(|s| !decoder.supported_symbologies().contains(s))
            .collect();
        if !unreadable.is_empty() {
            debug!(?unreadable, "Decoder cannot read some enabled symbologies");
        }

        Self::new(decoder)
            .with_strategies(&config.enabled_strategies)
            .with_symbologies(&config.enabled_symbologies)
            .with_contrast_gain(config.contrast_gain)
            .with_max_dimension(config.max_decode_dimension)
    }

    pub fn with_strategies(mut self, strategies: &[Strategy]) -> Self {
        self.strategies = Strategy::canonical(strategies);
        self
    }

    pub fn with_symbologies(mut self, symbologies: &[Symbology]) -> Self {
        self.symbologies = symbologies.to_vec();
        self
    }

    pub fn with_contrast_gain(mut self, gain: f32) -> Self {
        self.contrast_gain = gain;
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Strategies in the order they run
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn symbologies(&self) -> &[Symbology] {
        &self.symbologies
    }

    /// Try each strategy in turn on a frame
    ///
    /// The frame is only read; every strategy works on its own derived image.
    pub fn decode_frame(&self, frame: &Frame) -> DecodeOutcome {
        let Some(luma) = preprocess::frame_to_luma(frame) else {
            debug!(
                width = frame.width,
                height = frame.height,
                bytes = frame.data.len(),
                "Frame buffer too short, skipping decode"
            );
            return DecodeOutcome::NotFound;
        };
        let luma = preprocess::downscale_to_fit(luma, self.max_dimension);
        self.decode_luma(&luma)
    }

    /// Try each strategy in turn on a prepared luminance image
    pub fn decode_luma(&self, luma: &LumaImage) -> DecodeOutcome {
        if self.strategies.is_empty() || self.symbologies.is_empty() || luma.is_empty() {
            return DecodeOutcome::NotFound;
        }

        let mut enhanced: Option<LumaImage> = None;

        for &strategy in &self.strategies {
            let (image, binarizer) = match strategy {
                Strategy::Standard => (luma, Binarizer::Adaptive),
                Strategy::GlobalHistogram => (luma, Binarizer::GlobalHistogram),
                Strategy::Enhanced => {
                    let stretched = enhanced
                        .get_or_insert_with(|| preprocess::contrast_stretch(luma, self.contrast_gain));
                    (&*stretched, Binarizer::Adaptive)
                }
            };

            if let Some(symbol) = self.attempt(strategy, image, binarizer) {
                debug!(
                    strategy = strategy.as_str(),
                    symbology = %symbol.symbology,
                    "Barcode decoded"
                );
                return DecodeOutcome::Decoded(Decoded {
                    payload: symbol.payload,
                    symbology: symbol.symbology,
                    strategy,
                });
            }
        }

        DecodeOutcome::NotFound
    }

    fn attempt(&self, strategy: Strategy, image: &LumaImage, binarizer: Binarizer) -> Option<DecodedSymbol> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.decoder.decode(image, binarizer, &self.symbologies)
        }));

        match result {
            Ok(Ok(symbol)) => Some(symbol),
            Ok(Err(DecodeError::NotFound)) => {
                trace!(strategy = strategy.as_str(), "No barcode found");
                None
            }
            Ok(Err(DecodeError::Fault(message))) => {
                debug!(strategy = strategy.as_str(), error = %message, "Decoder fault, treating as not found");
                None
            }
            Err(_) => {
                warn!(strategy = strategy.as_str(), "Decoder panicked, treating as not found");
                None
            }
        }
    }
}
