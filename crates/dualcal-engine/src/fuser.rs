//! Shared-reference fusion.
//!
//! Units fed by the same noise source and clock splitter measure the same
//! physical reference. When at least two of them succeed, their noise
//! floor and per-channel phase offsets are averaged and written back to
//! every successful unit. Gains stay per unit.
//!
//! Units are reduced in `unit_id` order, so the output is bit-identical
//! for any permutation of an input with distinct unit ids.

use dualcal_core::config::CalibrationConfig;
use dualcal_core::domain::{FusedCalibrationResult, SharedReference, UnitCalibrationResult};
use tracing::{debug, warn};

use crate::calibrator::build_calibration_matrix;

/// Merges per-unit results into a [`FusedCalibrationResult`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharedReferenceFuser {
    recompute_matrices: bool,
    cross_coupling: f64,
}

impl Default for SharedReferenceFuser {
    fn default() -> Self {
        Self::from_config(&CalibrationConfig::default())
    }
}

impl SharedReferenceFuser {
    /// Fuser that optionally rebuilds fused units' matrices using
    /// `cross_coupling`.
    #[must_use]
    pub fn new(recompute_matrices: bool, cross_coupling: f64) -> Self {
        Self {
            recompute_matrices,
            cross_coupling,
        }
    }

    /// Fuser using the matrix settings of `config`.
    #[must_use]
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self::new(config.recompute_matrices, config.cross_coupling)
    }

    /// Fuse `results`.
    ///
    /// Pass-through (no shared block, units untouched) when
    /// `shared_reference` is off or fewer than two units succeeded. Failed
    /// units never contribute and are never modified. Output units are
    /// sorted by `unit_id`.
    ///
    /// Unit ids are expected to be unique. Of several results with the same
    /// id only the first in input order is kept.
    #[must_use]
    pub fn fuse(
        &self,
        mut results: Vec<UnitCalibrationResult>,
        shared_reference: bool,
    ) -> FusedCalibrationResult {
        results.sort_by_key(|r| r.unit_id);
        let received = results.len();
        results.dedup_by_key(|r| r.unit_id);
        if results.len() < received {
            warn!(
                dropped = received - results.len(),
                "duplicate unit ids in fusion input; keeping the first of each"
            );
        }

        let contributors: Vec<&UnitCalibrationResult> = results
            .iter()
            .filter(|r| r.is_success() && r.noise_floor_db.is_some())
            .collect();

        if !shared_reference || contributors.len() < 2 {
            debug!(
                shared_reference,
                successful = contributors.len(),
                "fusion is a pass-through"
            );
            return FusedCalibrationResult {
                shared: None,
                units: results,
            };
        }

        let shared = average_reference(&contributors);
        debug!(
            noise_floor_db = shared.noise_floor_db,
            units = shared.contributing_units.len(),
            "shared reference fused"
        );

        for unit in results
            .iter_mut()
            .filter(|r| shared.contributing_units.contains(&r.unit_id))
        {
            let channels = unit.phase_offsets_rad.len();
            unit.noise_floor_db = Some(shared.noise_floor_db);
            unit.phase_offsets_rad = shared
                .phase_offsets_rad
                .iter()
                .take(channels)
                .copied()
                .collect();
            unit.shared_reference_applied = true;
            if self.recompute_matrices {
                unit.calibration_matrix = build_calibration_matrix(
                    &unit.channel_gains,
                    &unit.phase_offsets_rad,
                    self.cross_coupling,
                );
            }
        }

        FusedCalibrationResult {
            shared: Some(shared),
            units: results,
        }
    }
}

/// Mean noise floor and per-channel mean phase over `units`.
///
/// A channel missing from some unit is averaged over the units that have it.
fn average_reference(units: &[&UnitCalibrationResult]) -> SharedReference {
    let noise_sum: f64 = units.iter().filter_map(|u| u.noise_floor_db).sum();
    let noise_floor_db = noise_sum / units.len() as f64;

    let channels = units.iter().map(|u| u.phase_offsets_rad.len()).max().unwrap_or(0);
    let mut sums = vec![0.0; channels];
    let mut counts = vec![0usize; channels];
    for unit in units {
        for (c, phase) in unit.phase_offsets_rad.iter().enumerate() {
            sums[c] += phase;
            counts[c] += 1;
        }
    }
    let phase_offsets_rad = sums
        .into_iter()
        .zip(counts)
        .map(|(sum, count)| if count == 0 { 0.0 } else { sum / count as f64 })
        .collect();

    SharedReference {
        noise_floor_db,
        phase_offsets_rad,
        contributing_units: units.iter().map(|u| u.unit_id).collect(),
    }
}
