// SPDX-License-Identifier: MPL-2.0

//! Integration tests decoding rendered barcodes with the bundled decoders

use barcode_scanner::decode::{Binarizer, LumaImage};
use barcode_scanner::{
    ChannelSink, DecodeOutcome, DecodeStrategyChain, DetectionPipeline, Decoder, Frame, PipelineConfig,
    RqrrDecoder, RxingDecoder, StillImageSource, Strategy, Symbology,
};
use qrcode::{Color, QrCode};
use rxing::{BarcodeFormat, MultiFormatWriter, Writer};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

const PRODUCT_CODE: &str = "1234567890";

/// QR code with a four module quiet zone, four pixels per module
fn render_qr(payload: &str, dark: u8, light: u8) -> LumaImage {
    let code = QrCode::new(payload.as_bytes()).unwrap();
    let modules = code.width();
    let colors = code.to_colors();
    let (scale, quiet) = (4, 4);
    let size = (modules + 2 * quiet) * scale;

    let data = (0..size * size)
        .map(|i| {
            let x = (i % size) / scale;
            let y = (i / size) / scale;
            let inside = (quiet..quiet + modules).contains(&x) && (quiet..quiet + modules).contains(&y);
            if inside && colors[(y - quiet) * modules + (x - quiet)] == Color::Dark {
                dark
            } else {
                light
            }
        })
        .collect();
    LumaImage::new(size, size, data)
}

/// Code 128 symbol, three pixels per module and 60 rows tall
fn render_code128(payload: &str) -> LumaImage {
    let matrix = MultiFormatWriter::default()
        .encode(payload, &BarcodeFormat::CODE_128, 0, 1)
        .unwrap();
    let modules = matrix.getWidth() as usize;
    let (scale, rows) = (3, 60);
    let width = modules * scale;

    let row: Vec<u8> = (0..width)
        .map(|x| if matrix.get((x / scale) as u32, 0) { 0 } else { 255 })
        .collect();
    LumaImage::new(width, rows, row.repeat(rows))
}

fn to_frame(image: &LumaImage) -> Frame {
    Frame::gray(image.width as u32, image.height as u32, image.data.clone())
}

#[test]
fn test_rxing_reads_qr_with_each_binarizer() {
    let image = render_qr(PRODUCT_CODE, 0, 255);
    for binarizer in [Binarizer::Adaptive, Binarizer::GlobalHistogram] {
        let symbol = RxingDecoder
            .decode(&image, binarizer, &Symbology::ALL)
            .unwrap_or_else(|e| panic!("{:?} failed: {:?}", binarizer, e));
        assert_eq!(symbol.payload, PRODUCT_CODE);
        assert_eq!(symbol.symbology, Symbology::QrCode);
    }
}

#[test]
fn test_rqrr_reads_qr_with_each_binarizer() {
    let image = render_qr("https://example.org/item/42", 0, 255);
    for binarizer in [Binarizer::Adaptive, Binarizer::GlobalHistogram] {
        let symbol = RqrrDecoder
            .decode(&image, binarizer, &[Symbology::QrCode])
            .unwrap_or_else(|e| panic!("{:?} failed: {:?}", binarizer, e));
        assert_eq!(symbol.payload, "https://example.org/item/42");
        assert_eq!(symbol.symbology, Symbology::QrCode);
    }
}

#[test]
fn test_rxing_reads_code128_with_each_binarizer() {
    let image = render_code128(PRODUCT_CODE);
    for binarizer in [Binarizer::Adaptive, Binarizer::GlobalHistogram] {
        let symbol = RxingDecoder
            .decode(&image, binarizer, &[Symbology::Code128, Symbology::Ean13])
            .unwrap_or_else(|e| panic!("{:?} failed: {:?}", binarizer, e));
        assert_eq!(symbol.payload, PRODUCT_CODE);
        assert_eq!(symbol.symbology, Symbology::Code128);
    }
}

#[test]
fn test_symbology_allow_list_limits_what_is_read() {
    let chain = DecodeStrategyChain::new(Arc::new(RxingDecoder)).with_symbologies(&[Symbology::QrCode]);
    assert_eq!(chain.decode_luma(&render_code128(PRODUCT_CODE)), DecodeOutcome::NotFound);

    let chain = DecodeStrategyChain::new(Arc::new(RxingDecoder)).with_symbologies(&[Symbology::Code128]);
    let decoded = chain.decode_luma(&render_code128(PRODUCT_CODE)).decoded().unwrap();
    assert_eq!(decoded.payload, PRODUCT_CODE);
    assert_eq!(decoded.strategy, Strategy::Standard);
}

#[test]
fn test_dim_low_contrast_qr_needs_enhancement() {
    // 19 grey levels apart: too flat for either binarizer until stretched
    let image = render_qr(PRODUCT_CODE, 42, 61);

    let decoded = DecodeStrategyChain::new(Arc::new(RxingDecoder))
        .decode_luma(&image)
        .decoded()
        .unwrap();
    assert_eq!(decoded.payload, PRODUCT_CODE);
    assert_eq!(decoded.strategy, Strategy::Enhanced);

    let without_enhancement = DecodeStrategyChain::new(Arc::new(RxingDecoder))
        .with_strategies(&[Strategy::Standard, Strategy::GlobalHistogram]);
    assert_eq!(without_enhancement.decode_luma(&image), DecodeOutcome::NotFound);
}

#[test]
fn test_default_pipeline_reports_product_barcode() {
    let (tx, rx) = mpsc::channel();
    let pipeline = DetectionPipeline::new(ChannelSink::new(tx));
    let source = StillImageSource::from_frame(to_frame(&render_code128(PRODUCT_CODE)));
    let config = PipelineConfig {
        poll_interval_ms: 10,
        capture_interval_ms: 5,
        ..Default::default()
    };

    pipeline.start(Box::new(source), config).unwrap();
    let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    pipeline.stop();

    assert_eq!(event.payload, PRODUCT_CODE);
    assert_eq!(event.symbology, Symbology::Code128);
    assert_eq!(event.strategy, Strategy::Standard);
}
