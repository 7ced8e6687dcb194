//! Error types for dual-radio calibration.
//!
//! # Error Hierarchy
//!
//! ```text
//! OrchestrationError (top-level, returned by a calibration run)
//! ├── ConfigError        (config validation / file loading)
//! ├── PlanError          (malformed frequency range or step, fatal)
//! └── AllUnitsFailed     (every unit failed; per-unit reasons attached)
//!
//! MeasurementError       (per frequency, per unit; recovered locally)
//! CacheError             (cache read / write; always recovered locally)
//! ```
//!
//! Only [`OrchestrationError`] ever reaches the caller of a run.
//! [`MeasurementError`]s are folded into a unit's failure list and
//! [`CacheError`]s degrade into a cache miss or a skipped write.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::UnitId;

/// Result alias for frequency planning.
pub type PlanResult<T> = Result<T, PlanError>;

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result alias for orchestration-level operations.
pub type CalResult<T> = Result<T, OrchestrationError>;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced when loading or validating a
/// [`CalibrationConfig`](crate::config::CalibrationConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value outside its valid domain.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The config file could not be read.
    #[error("failed to read config file {path:?}: {source}")]
    FileRead {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file could not be written.
    #[error("failed to write config file {path:?}: {source}")]
    FileWrite {
        /// Path that was being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for this schema.
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PlanError
// ---------------------------------------------------------------------------

/// Errors from frequency planning.
///
/// These are fatal for a run and are never retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanError {
    /// The frequency range or step cannot produce a usable plan.
    #[error("invalid frequency range [{lo_hz}, {hi_hz}] Hz with step {step_hz} Hz: {reason}")]
    InvalidRange {
        /// Lower bound of the range.
        lo_hz: f64,
        /// Upper bound of the range.
        hi_hz: f64,
        /// Step between consecutive frequencies.
        step_hz: f64,
        /// What is wrong with the range.
        reason: String,
    },

    /// A candidate frequency list is not strictly increasing.
    #[error("frequency plan is not strictly increasing at index {index}")]
    NotIncreasing {
        /// Index of the first out-of-order entry.
        index: usize,
    },

    /// A candidate frequency list is empty.
    #[error("frequency plan is empty")]
    Empty,

    /// A pre-scan spectrum cannot be interpreted.
    #[error("invalid spectrum hint: {reason}")]
    InvalidSpectrum {
        /// What is wrong with the spectrum.
        reason: String,
    },
}

impl PlanError {
    /// Construct a [`PlanError::InvalidRange`].
    pub fn invalid_range(lo_hz: f64, hi_hz: f64, step_hz: f64, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            lo_hz,
            hi_hz,
            step_hz,
            reason: reason.into(),
        }
    }

    /// Construct a [`PlanError::InvalidSpectrum`].
    pub fn invalid_spectrum(reason: impl Into<String>) -> Self {
        Self::InvalidSpectrum {
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// MeasurementError
// ---------------------------------------------------------------------------

/// A single failed measurement (one unit, one frequency).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MeasurementError {
    /// The measurement exceeded its dwell-time budget.
    #[error("measurement timed out after {budget_ms} ms")]
    Timeout {
        /// Budget that was exceeded, in milliseconds.
        budget_ms: u64,
    },

    /// The driver layer reported a hardware fault.
    #[error("hardware fault: {0}")]
    Hardware(String),

    /// The driver returned data that cannot be used.
    #[error("invalid measurement: {reason}")]
    InvalidResponse {
        /// What is wrong with the data.
        reason: String,
    },

    /// No measurement exists for the requested unit/frequency.
    #[error("no measurement available for unit {unit_id} at {frequency_hz} Hz")]
    Unavailable {
        /// Requested unit.
        unit_id: UnitId,
        /// Requested frequency.
        frequency_hz: f64,
    },
}

impl MeasurementError {
    /// Construct a [`MeasurementError::InvalidResponse`].
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Returns `true` if retrying the same request could succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Hardware(_))
    }
}

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Errors from the calibration cache.
///
/// The orchestrator never escalates these: a read error is a miss and a
/// write error is a skipped write.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache record could not be read.
    #[error("failed to read cache record {path:?}: {source}")]
    Read {
        /// Cache file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The cache record could not be written.
    #[error("failed to write cache record {path:?}: {source}")]
    Write {
        /// Cache file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The record could not be (de)serialized.
    #[error("cache record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The record was written by an incompatible schema version.
    #[error("cache schema version {found} does not match expected {expected}")]
    SchemaMismatch {
        /// Version found on disk.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },
}

impl CacheError {
    /// Returns `true` if the error may clear up on a later attempt.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Write { .. })
    }
}

// ---------------------------------------------------------------------------
// OrchestrationError
// ---------------------------------------------------------------------------

/// Why one unit produced no usable calibration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    /// The failed unit.
    pub unit_id: UnitId,
    /// Human-readable failure reason.
    pub reason: String,
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.unit_id, self.reason)
    }
}

fn summarize_failures(failures: &[UnitFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Top-level error for a calibration run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchestrationError {
    /// The configuration failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The frequency plan could not be built.
    #[error("planning error: {0}")]
    Plan(#[from] PlanError),

    /// Every configured unit failed.
    #[error("all {} units failed: {}", .failures.len(), summarize_failures(.failures))]
    AllUnitsFailed {
        /// Failure reason for each unit.
        failures: Vec<UnitFailure>,
    },

    /// The caller's deadline expired; in-flight work was cancelled.
    #[error("calibration run cancelled after deadline of {deadline_ms} ms")]
    DeadlineExceeded {
        /// Deadline that expired, in milliseconds.
        deadline_ms: u64,
    },
}

impl OrchestrationError {
    /// Per-unit failure reasons, if this error carries any.
    #[must_use]
    pub fn unit_failures(&self) -> &[UnitFailure] {
        match self {
            Self::AllUnitsFailed { failures } => failures,
            _ => &[],
        }
    }

    /// Returns `true` if a later run with the same configuration may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::AllUnitsFailed { .. } | Self::DeadlineExceeded { .. } => true,
            Self::Config(_) | Self::Plan(_) => false,
        }
    }
}
