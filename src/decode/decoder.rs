// SPDX-License-Identifier: GPL-3.0-only

//! Barcode decoding library boundary
//!
//! The strategy chain talks to a [`Decoder`], never to a concrete library.
//! Two implementations ship with the crate:
//!
//! - [`RxingDecoder`], the default, reads every [`Symbology`] through `rxing`
//!   and maps each `Binarizer` onto the library's own binarizer.
//! - [`RqrrDecoder`] reads QR codes only, with `rqrr`.

use super::preprocess::{LumaImage, global_histogram_threshold};
use super::Symbology;
use crate::errors::DecodeError;
use rqrr::PreparedImage;
use rxing::common::{GlobalHistogramBinarizer, HybridBinarizer};
use rxing::{
    BarcodeFormat, BinaryBitmap, DecodeHintType, DecodeHintValue, DecodingHintDictionary, Exceptions,
    Luma8LuminanceSource, MultiFormatReader, RXingResult, Reader,
};
use std::collections::HashSet;
use tracing::trace;

/// How an image is reduced to black and white before locating a code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binarizer {
    /// Local thresholding that adapts to uneven lighting
    Adaptive,
    /// One threshold for the whole image, taken from its luminance histogram
    GlobalHistogram,
}

/// A payload found by a decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSymbol {
    pub payload: String,
    pub symbology: Symbology,
}

/// A barcode reading library
///
/// Implementations must not modify the image. Returning
/// `DecodeError::NotFound` is the normal result for frames without a code.
pub trait Decoder: Send + Sync {
    fn decode(
        &self,
        image: &LumaImage,
        binarizer: Binarizer,
        symbologies: &[Symbology],
    ) -> Result<DecodedSymbol, DecodeError>;

    /// Symbologies this decoder can actually read
    fn supported_symbologies(&self) -> &[Symbology];
}

/// Multi-format decoder backed by `rxing`
///
/// `Binarizer::Adaptive` uses the hybrid (local block) binarizer and
/// `Binarizer::GlobalHistogram` the global histogram one. Only the requested
/// symbologies are searched for, and the reader is told to try harder.
#[derive(Debug, Default, Clone, Copy)]
pub struct RxingDecoder;

impl RxingDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// Library format for a symbology
pub fn barcode_format(symbology: Symbology) -> BarcodeFormat {
    match symbology {
        Symbology::QrCode => BarcodeFormat::QR_CODE,
        Symbology::Code128 => BarcodeFormat::CODE_128,
        Symbology::Code39 => BarcodeFormat::CODE_39,
        Symbology::Code93 => BarcodeFormat::CODE_93,
        Symbology::Ean13 => BarcodeFormat::EAN_13,
        Symbology::Ean8 => BarcodeFormat::EAN_8,
        Symbology::UpcA => BarcodeFormat::UPC_A,
        Symbology::UpcE => BarcodeFormat::UPC_E,
        Symbology::Codabar => BarcodeFormat::CODABAR,
        Symbology::Itf => BarcodeFormat::ITF,
        Symbology::Rss14 => BarcodeFormat::RSS_14,
        Symbology::RssExpanded => BarcodeFormat::RSS_EXPANDED,
        Symbology::DataMatrix => BarcodeFormat::DATA_MATRIX,
        Symbology::Pdf417 => BarcodeFormat::PDF_417,
        Symbology::Aztec => BarcodeFormat::AZTEC,
        Symbology::MaxiCode => BarcodeFormat::MAXICODE,
    }
}

/// Symbology for a library format, `None` for formats outside `Symbology`
pub fn symbology_for(format: &BarcodeFormat) -> Option<Symbology> {
    Symbology::ALL.into_iter().find(|s| barcode_format(*s) == *format)
}

fn decode_hints(symbologies: &[Symbology]) -> DecodingHintDictionary {
    let formats: HashSet<BarcodeFormat> = symbologies.iter().map(|s| barcode_format(*s)).collect();
    let mut hints = DecodingHintDictionary::new();
    hints.insert(DecodeHintType::POSSIBLE_FORMATS, DecodeHintValue::PossibleFormats(formats));
    hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(true));
    hints
}

fn read_bitmap<B: rxing::Binarizer>(
    mut bitmap: BinaryBitmap<B>,
    hints: &DecodingHintDictionary,
) -> Result<RXingResult, Exceptions> {
    MultiFormatReader::default().decode_with_hints(&mut bitmap, hints)
}

impl Decoder for RxingDecoder {
    fn decode(
        &self,
        image: &LumaImage,
        binarizer: Binarizer,
        symbologies: &[Symbology],
    ) -> Result<DecodedSymbol, DecodeError> {
        if symbologies.is_empty() || image.is_empty() {
            return Err(DecodeError::NotFound);
        }

        let hints = decode_hints(symbologies);
        let source = Luma8LuminanceSource::new(image.data.clone(), image.width as u32, image.height as u32);
        let result = match binarizer {
            Binarizer::Adaptive => read_bitmap(BinaryBitmap::new(HybridBinarizer::new(source)), &hints),
            Binarizer::GlobalHistogram => {
                read_bitmap(BinaryBitmap::new(GlobalHistogramBinarizer::new(source)), &hints)
            }
        };

        // Not found, checksum and format failures all mean no readable code
        let result = result.map_err(|e| {
            trace!(error = %e, ?binarizer, "rxing read nothing");
            DecodeError::NotFound
        })?;

        let format = result.getBarcodeFormat();
        let symbology = symbology_for(format)
            .ok_or_else(|| DecodeError::Fault(format!("unexpected barcode format {:?}", format)))?;
        Ok(DecodedSymbol {
            payload: result.getText().to_string(),
            symbology,
        })
    }

    fn supported_symbologies(&self) -> &[Symbology] {
        &Symbology::ALL
    }
}

/// QR code decoder backed by `rqrr`
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// Decode every grid rqrr located, keeping the first readable one
fn first_readable<I>(grids: I) -> Option<String>
where
    I: IntoIterator<Item = Result<String, String>>,
{
    grids.into_iter().find_map(|result| match result {
        Ok(content) => Some(content),
        Err(e) => {
            trace!(error = %e, "Located QR grid did not decode");
            None
        }
    })
}

impl Decoder for RqrrDecoder {
    fn decode(
        &self,
        image: &LumaImage,
        binarizer: Binarizer,
        symbologies: &[Symbology],
    ) -> Result<DecodedSymbol, DecodeError> {
        if !symbologies.contains(&Symbology::QrCode) || image.is_empty() {
            return Err(DecodeError::NotFound);
        }

        let (w, h) = (image.width, image.height);
        let results: Vec<Result<String, String>> = match binarizer {
            Binarizer::Adaptive => {
                let mut prepared = PreparedImage::prepare_from_greyscale(w, h, |x, y| image.get(x, y));
                prepared
                    .detect_grids()
                    .iter()
                    .map(|grid| grid.decode().map(|(_, content)| content).map_err(|e| format!("{:?}", e)))
                    .collect()
            }
            Binarizer::GlobalHistogram => {
                let threshold = global_histogram_threshold(image).ok_or(DecodeError::NotFound)?;
                trace!(threshold, "Global histogram black point");
                let mut prepared =
                    PreparedImage::prepare_from_bitmap(w, h, |x, y| image.get(x, y) < threshold);
                prepared
                    .detect_grids()
                    .iter()
                    .map(|grid| grid.decode().map(|(_, content)| content).map_err(|e| format!("{:?}", e)))
                    .collect()
            }
        };

        first_readable(results)
            .map(|payload| DecodedSymbol {
                payload,
                symbology: Symbology::QrCode,
            })
            .ok_or(DecodeError::NotFound)
    }

    fn supported_symbologies(&self) -> &[Symbology] {
        &[Symbology::QrCode]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_symbology_has_a_library_format() {
        let formats: HashSet<BarcodeFormat> = Symbology::ALL.into_iter().map(barcode_format).collect();
        assert_eq!(formats.len(), Symbology::ALL.len());
        for symbology in Symbology::ALL {
            assert_eq!(symbology_for(&barcode_format(symbology)), Some(symbology));
        }
        assert_eq!(symbology_for(&BarcodeFormat::UPC_EAN_EXTENSION), None);
    }

    #[test]
    fn test_rxing_blank_image_is_not_found() {
        let image = LumaImage::filled(120, 80, 255);
        for binarizer in [Binarizer::Adaptive, Binarizer::GlobalHistogram] {
            assert_eq!(
                RxingDecoder.decode(&image, binarizer, &Symbology::ALL),
                Err(DecodeError::NotFound)
            );
        }
    }

    #[test]
    fn test_rxing_with_no_symbologies_is_not_found() {
        let image = LumaImage::filled(64, 64, 0);
        assert_eq!(RxingDecoder.decode(&image, Binarizer::Adaptive, &[]), Err(DecodeError::NotFound));
        assert_eq!(RxingDecoder.supported_symbologies().len(), Symbology::ALL.len());
    }

    #[test]
    fn test_blank_image_is_not_found() {
        let image = LumaImage::filled(64, 64, 255);
        for binarizer in [Binarizer::Adaptive, Binarizer::GlobalHistogram] {
            assert_eq!(
                RqrrDecoder.decode(&image, binarizer, &[Symbology::QrCode]),
                Err(DecodeError::NotFound)
            );
        }
    }

    #[test]
    fn test_qr_not_requested_is_not_found() {
        let image = LumaImage::filled(16, 16, 0);
        assert_eq!(
            RqrrDecoder.decode(&image, Binarizer::Adaptive, &[Symbology::Ean13]),
            Err(DecodeError::NotFound)
        );
    }

    #[test]
    fn test_empty_image_is_not_found() {
        let image = LumaImage::new(0, 0, Vec::new());
        assert_eq!(
            RqrrDecoder.decode(&image, Binarizer::Adaptive, &[Symbology::QrCode]),
            Err(DecodeError::NotFound)
        );
    }

    #[test]
    fn test_first_readable_skips_failed_grids() {
        let results = vec![Err("ecc".to_string()), Ok("hello".to_string()), Ok("later".to_string())];
        assert_eq!(first_readable(results), Some("hello".to_string()));
        assert_eq!(first_readable(Vec::new()), None);
    }

    #[test]
    fn test_supports_only_qr() {
        assert_eq!(RqrrDecoder.supported_symbologies(), &[Symbology::QrCode]);
    }
}
