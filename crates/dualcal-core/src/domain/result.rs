//! Per-unit and fused calibration results.

use std::time::Duration;

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::measurement::{FrequencyFailure, FrequencyMeasurement, UnitId};
use crate::error::UnitFailure;

// ---------------------------------------------------------------------------
// UnitStatus
// ---------------------------------------------------------------------------

/// Outcome of calibrating one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitStatus {
    /// At least one frequency produced a usable measurement.
    Success,
    /// No frequency produced a usable measurement.
    Failed {
        /// Why the unit failed.
        reason: String,
    },
}

impl UnitStatus {
    /// `true` for [`UnitStatus::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

// ---------------------------------------------------------------------------
// UnitCalibrationResult
// ---------------------------------------------------------------------------

/// Everything one unit calibration produced.
///
/// `measurements` is sorted by frequency and only holds frequencies that
/// succeeded; the rest are listed in `failures`. The summary fields
/// (`channel_gains`, `phase_offsets_rad`, `noise_floor_db`) are means over
/// the successful measurements and are empty / `None` for a failed unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitCalibrationResult {
    pub unit_id: UnitId,
    pub measurements: Vec<FrequencyMeasurement>,
    pub failures: Vec<FrequencyFailure>,
    pub channel_gains: Vec<f64>,
    pub phase_offsets_rad: Vec<f64>,
    pub noise_floor_db: Option<f64>,
    /// `A × A` complex correction matrix, `A` = antenna count.
    pub calibration_matrix: Array2<Complex64>,
    pub elapsed: Duration,
    pub status: UnitStatus,
    /// Set by fusion when this unit's noise floor and phases were replaced
    /// by the shared reference.
    #[serde(default)]
    pub shared_reference_applied: bool,
}

impl UnitCalibrationResult {
    /// A unit that produced nothing usable.
    pub fn failed(unit_id: UnitId, reason: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            unit_id,
            measurements: Vec::new(),
            failures: Vec::new(),
            channel_gains: Vec::new(),
            phase_offsets_rad: Vec::new(),
            noise_floor_db: None,
            calibration_matrix: Array2::zeros((0, 0)),
            elapsed,
            status: UnitStatus::Failed {
                reason: reason.into(),
            },
            shared_reference_applied: false,
        }
    }

    /// `true` if the unit succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Failure details, if the unit failed.
    #[must_use]
    pub fn failure(&self) -> Option<UnitFailure> {
        match &self.status {
            UnitStatus::Success => None,
            UnitStatus::Failed { reason } => Some(UnitFailure {
                unit_id: self.unit_id,
                reason: reason.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Fused result
// ---------------------------------------------------------------------------

/// Reference values averaged across units sharing a noise source and clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedReference {
    pub noise_floor_db: f64,
    pub phase_offsets_rad: Vec<f64>,
    /// Units that contributed to the average, in ascending order.
    pub contributing_units: Vec<UnitId>,
}

/// Outcome of a calibration run: every unit plus the optional shared block.
///
/// `shared` is `None` when fusion was a pass-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedCalibrationResult {
    pub shared: Option<SharedReference>,
    /// Unit results sorted by `unit_id`.
    pub units: Vec<UnitCalibrationResult>,
}

impl FusedCalibrationResult {
    /// `true` if at least one unit failed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.units.iter().any(|u| !u.is_success())
    }

    /// Failure details for every failed unit.
    #[must_use]
    pub fn failed_units(&self) -> Vec<UnitFailure> {
        self.units.iter().filter_map(UnitCalibrationResult::failure).collect()
    }

    /// Number of successful units.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_success()).count()
    }

    /// Look up one unit.
    #[must_use]
    pub fn unit(&self, unit_id: UnitId) -> Option<&UnitCalibrationResult> {
        self.units.iter().find(|u| u.unit_id == unit_id)
    }
}
