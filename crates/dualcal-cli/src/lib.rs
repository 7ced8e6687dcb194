//! Dual-radio calibration CLI
//!
//! Command-line front end for the calibration engine.
//!
//! # Usage
//!
//! ```bash
//! # Write a default configuration
//! dualcal init-config dualcal.json --mode balanced
//!
//! # Calibrate from a recorded capture and keep the fused result
//! dualcal run --config dualcal.json --replay capture.json --output result.json
//!
//! # Check whether the cached calibration is still usable
//! dualcal inspect-cache --config dualcal.json
//!
//! # Recalibrate every ten minutes
//! dualcal watch --config dualcal.json --replay capture.json --interval-secs 600
//! ```

use clap::{Parser, Subcommand};

pub mod commands;

/// Dual-radio calibration command line interface
#[derive(Parser, Debug)]
#[command(name = "dualcal")]
#[command(author, version, about = "Calibrate multiple SDR units against a shared reference")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one calibration and print the performance summary
    Run(commands::RunArgs),

    /// Write a configuration file populated with defaults
    InitConfig(commands::InitConfigArgs),

    /// Report the state of the cached calibration
    InspectCache(commands::InspectCacheArgs),

    /// Recalibrate periodically and print every outcome
    Watch(commands::WatchArgs),

    /// Display version information
    Version,
}
