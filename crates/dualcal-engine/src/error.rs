//! Errors raised by the engine's adapters.
//!
//! Planning, measurement, cache and orchestration errors live in
//! `dualcal_core::error`; this module only covers loading recorded
//! captures for [`ReplayMeasurementPort`](crate::adapter::ReplayMeasurementPort).

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading a replay capture.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The capture file could not be read.
    #[error("failed to read replay capture {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The capture is not valid JSON for the capture schema.
    #[error("failed to parse replay capture: {0}")]
    Parse(#[from] serde_json::Error),

    /// A unit key is not a unit index.
    #[error("invalid unit key `{key}` in replay capture")]
    InvalidUnit { key: String },

    /// A recorded entry has a non-finite frequency.
    #[error("non-finite frequency recorded for {unit}")]
    InvalidFrequency { unit: String },
}
