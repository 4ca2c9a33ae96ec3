// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Scanning from a live camera
//! - Scanning a single image file

use crate::ScanOptions;
use barcode_scanner::constants::timing::STILL_IMAGE_TIMEOUT;
use barcode_scanner::{
    AppError, AppResult, CameraDriver, ChannelSink, DetectionEvent, DetectionPipeline, LiveCamera,
    PipelineConfig, StatsSnapshot, StillImageSource, V4l2Driver,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Load the config file, then apply command-line overrides
pub fn load_config(path: Option<&Path>, options: &ScanOptions) -> AppResult<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::load_default()?,
    };

    if let Some(poll_ms) = options.poll_ms {
        config.poll_interval_ms = poll_ms;
    }
    if let Some(cooldown_ms) = options.cooldown_ms {
        config.cooldown_ms = cooldown_ms;
    }
    if let Some(strategies) = &options.strategies {
        config.enabled_strategies = strategies.clone();
    }
    if let Some(symbologies) = &options.symbologies {
        config.enabled_symbologies = symbologies.clone();
    }

    config.validate()?;
    Ok(config)
}

/// List all available cameras
pub fn list_cameras() -> AppResult<()> {
    let driver = V4l2Driver::new();
    let cameras = driver.enumerate_devices();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {} ({})", index, camera.name, camera.path);

        match driver.list_resolutions(camera) {
            Ok(resolutions) if !resolutions.is_empty() => {
                // Show top 5 resolutions
                let res_strs: Vec<String> = resolutions.iter().take(5).map(|r| r.to_string()).collect();
                println!("      Resolutions: {}", res_strs.join(", "));
            }
            Ok(_) => {}
            Err(e) => println!("      Resolutions unavailable: {}", e),
        }
        println!();
    }

    Ok(())
}

fn print_detection(event: &DetectionEvent, json: bool) {
    if json {
        let line = serde_json::json!({
            "payload": event.payload,
            "symbology": event.symbology,
            "strategy": event.strategy,
            "detected_at": event.detected_at.to_rfc3339(),
            "frame_sequence": event.frame_sequence,
        });
        println!("{}", line);
    } else {
        println!(
            "[{}] {}: {} ({})",
            event.detected_at.format("%H:%M:%S"),
            event.symbology,
            event.payload,
            event.strategy
        );
    }
}

fn print_stats(stats: &StatsSnapshot, json: bool) {
    if json {
        match serde_json::to_string(stats) {
            Ok(line) => eprintln!("{}", line),
            Err(e) => eprintln!("Failed to serialize statistics: {}", e),
        }
    } else {
        eprintln!("Session: {}", stats);
    }
}

/// Scan from a live camera until Ctrl+C, the duration elapses, or (with
/// `once`) the first detection
pub fn scan_camera(config: PipelineConfig, duration: Option<u64>, once: bool, json: bool) -> AppResult<()> {
    let (tx, rx) = mpsc::channel();
    let pipeline = DetectionPipeline::new(ChannelSink::new(tx));

    let source = LiveCamera::new(V4l2Driver::new(), config.device_index);
    let poll_interval = config.poll_interval();
    pipeline.start(Box::new(source), config)?;

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = Arc::clone(&stop_flag);
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| AppError::Other(format!("Failed to install Ctrl+C handler: {}", e)))?;

    if !json {
        eprintln!("Scanning... (press Ctrl+C to stop)");
    }

    let start = Instant::now();
    let deadline = duration.map(Duration::from_secs);

    loop {
        if stop_flag.load(Ordering::SeqCst) {
            break;
        }
        if deadline.is_some_and(|limit| start.elapsed() >= limit) {
            break;
        }

        match rx.recv_timeout(poll_interval) {
            Ok(event) => {
                print_detection(&event, json);
                if once {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    pipeline.stop();
    print_stats(&pipeline.stats(), json);
    Ok(())
}

/// Run one image file through the pipeline
pub fn scan_image(path: &Path, config: PipelineConfig, json: bool) -> AppResult<()> {
    let (tx, rx) = mpsc::channel();
    let pipeline = DetectionPipeline::new(ChannelSink::new(tx));

    pipeline.start(Box::new(StillImageSource::from_path(path)), config)?;
    let result = rx.recv_timeout(STILL_IMAGE_TIMEOUT);
    pipeline.stop();

    match result {
        Ok(event) => {
            print_detection(&event, json);
            Ok(())
        }
        Err(_) => Err(AppError::Other(format!(
            "No barcode found in {}",
            path.display()
        ))),
    }
}
