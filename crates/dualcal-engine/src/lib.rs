//! # dualcal-engine
//!
//! Calibration engine for radio units sharing a noise reference and clock.
//!
//! - [`FrequencyPlanner`] -- fixed-step or signal-informed frequency plans
//! - [`UnitCalibrator`] -- drives one unit through a plan via a
//!   [`MeasurementPort`](dualcal_core::port::MeasurementPort)
//! - [`NoiseSourceArbiter`] -- keeps concurrent units off the same frequency
//! - [`SharedReferenceFuser`] -- averages the shared noise floor and phase
//! - [`CalibrationCache`] -- fingerprinted, TTL-bounded result cache
//! - [`CalibrationOrchestrator`] -- runs the whole thing and reports metrics
//! - [`RecalibrationTask`] -- periodic re-runs published on a channel
//! - [`ReplayMeasurementPort`] -- serves recorded hardware captures
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dualcal_core::CalibrationConfig;
//! use dualcal_engine::{CalibrationCache, CalibrationOrchestrator, ReplayMeasurementPort};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CalibrationConfig::default();
//! let port = ReplayMeasurementPort::from_file("capture.json".as_ref(), 1e3)?;
//! let cache = CalibrationCache::file(&config.cache_path);
//! let orchestrator = CalibrationOrchestrator::new(Arc::new(port), Arc::new(cache));
//!
//! let report = orchestrator.run(&config).await?;
//! println!("{}", report.metrics);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod adapter;
pub mod arbiter;
pub mod cache;
pub mod calibrator;
pub mod error;
pub mod fuser;
pub mod orchestrator;
pub mod planner;
pub mod profiler;
pub mod recalibration;

pub use adapter::{ReplayCapture, ReplayMeasurementPort};
pub use arbiter::NoiseSourceArbiter;
pub use cache::{
    fingerprint, CacheLookup, CalibrationCache, FileRecordStore, MemoryRecordStore, RecordStore,
};
pub use calibrator::{build_calibration_matrix, UnitCalibrator};
pub use error::ReplayError;
pub use fuser::SharedReferenceFuser;
pub use orchestrator::{CalibrationOrchestrator, RunOptions};
pub use planner::FrequencyPlanner;
pub use profiler::CalibrationProfiler;
pub use recalibration::{RecalibrationEvent, RecalibrationStream, RecalibrationTask};
