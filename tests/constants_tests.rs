// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use barcode_scanner::constants::{decode, file_formats, timing};
use barcode_scanner::{Strategy, Symbology};

#[test]
fn test_strategy_order() {
    // Strategies are tried cheapest first, enhancement last
    assert_eq!(
        Strategy::ALL,
        [Strategy::Standard, Strategy::GlobalHistogram, Strategy::Enhanced]
    );
    for (index, strategy) in Strategy::ALL.iter().enumerate() {
        assert_eq!(strategy.index(), index);
    }
}

#[test]
fn test_strategy_display_names() {
    for strategy in Strategy::ALL {
        let name = strategy.display_name();
        assert!(!name.is_empty(), "Strategy {:?} has empty display name", strategy);
        // Every name parses back
        assert_eq!(strategy.as_str().parse::<Strategy>().unwrap(), strategy);
    }
}

#[test]
fn test_symbology_names_round_trip() {
    assert_eq!(Symbology::ALL.len(), 16);
    for symbology in Symbology::ALL {
        assert_eq!(symbology.as_str().parse::<Symbology>().unwrap(), symbology);
    }
}

#[test]
fn test_timing_defaults() {
    assert_eq!(timing::POLL_INTERVAL_MS, 100);
    assert_eq!(timing::COOLDOWN_MS, 2000);
    assert_eq!(timing::CAPTURE_INTERVAL_MS, 33);
    assert!(timing::POLL_INTERVAL_MS < timing::COOLDOWN_MS);
}

#[test]
fn test_decode_defaults() {
    assert_eq!(decode::CONTRAST_GAIN, 1.5);
    assert_eq!(decode::LUMINANCE_BUCKETS, 1 << (8 - decode::LUMINANCE_SHIFT));
}

#[test]
fn test_image_extensions() {
    assert!(file_formats::is_image_extension("png"));
    assert!(file_formats::is_image_extension("JPG"));
    assert!(!file_formats::is_image_extension("txt"));
}
