// SPDX-License-Identifier: GPL-3.0-only

use barcode_scanner::{Strategy, Symbology};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "barcode-scanner")]
#[command(about = "Scan barcodes from a camera or an image file")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.config/barcode-scanner/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by the scanning commands; each overrides the config file
#[derive(clap::Args, Debug, Default)]
pub struct ScanOptions {
    /// Poll interval in milliseconds
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Cooldown before the same code is reported again, in milliseconds
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Decode strategies to enable (standard, global, enhanced)
    #[arg(long, value_delimiter = ',')]
    strategies: Option<Vec<Strategy>>,

    /// Symbologies to look for (e.g. QR_CODE,EAN_13)
    #[arg(long, value_delimiter = ',')]
    symbologies: Option<Vec<Symbology>>,

    /// Print detections as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Scan barcodes from a camera until Ctrl+C
    Scan {
        /// Camera index to use (from 'barcode-scanner list')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Requested capture width
        #[arg(long)]
        width: Option<u32>,

        /// Requested capture height
        #[arg(long)]
        height: Option<u32>,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Stop after the first detection
        #[arg(long)]
        once: bool,

        #[command(flatten)]
        options: ScanOptions,
    },

    /// Scan an image file
    Image {
        /// Image to decode
        path: PathBuf,

        #[command(flatten)]
        options: ScanOptions,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=barcode_scanner=trace, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config;

    match cli.command {
        Commands::List => cli::list_cameras()?,
        Commands::Scan {
            camera,
            width,
            height,
            duration,
            once,
            options,
        } => {
            let mut config = cli::load_config(config_path.as_deref(), &options)?;
            if camera.is_some() {
                config.device_index = camera;
            }
            if let Some(width) = width {
                config.resolution.width = width;
            }
            if let Some(height) = height {
                config.resolution.height = height;
            }
            cli::scan_camera(config, duration, once, options.json)?
        }
        Commands::Image { path, options } => {
            let config = cli::load_config(config_path.as_deref(), &options)?;
            cli::scan_image(&path, config, options.json)?
        }
    }

    Ok(())
}
