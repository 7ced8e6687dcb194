//! # dualcal-core
//!
//! Core types for calibrating several radio front-ends that share one noise
//! reference and one clock distribution.
//!
//! This crate provides:
//!
//! - **Configuration**: [`CalibrationConfig`] with documented defaults and validation
//! - **Domain types**: [`FrequencyPlan`], [`SpectrumHint`], [`UnitCalibrationResult`],
//!   [`FusedCalibrationResult`], [`CacheRecord`], [`RunMetrics`]
//! - **Port**: [`MeasurementPort`] -- trait abstracting the radio driver
//! - **Errors**: the [`error`] taxonomy, rooted at [`OrchestrationError`]
//!
//! Planning, calibration, fusion, caching and orchestration live in
//! `dualcal-engine`.

#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use config::{CalibrationConfig, CalibrationMode, PlanMode, PlannerTuning};
pub use domain::{
    CacheRecord, ChannelMeasurement, FrequencyFailure, FrequencyMeasurement, FrequencyPlan,
    FusedCalibrationResult, MeasurementCounts, PhaseTiming, PlanSource, RunMetrics, RunReport,
    SharedReference, SpectrumHint, UnitCalibrationResult, UnitId, UnitStatus, UnitTiming,
    CACHE_SCHEMA_VERSION,
};
pub use error::{
    CacheError, CacheResult, CalResult, ConfigError, MeasurementError, OrchestrationError,
    PlanError, PlanResult, UnitFailure,
};
pub use port::{MeasurementPort, MeasurementRequest};
