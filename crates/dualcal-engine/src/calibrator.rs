//! Calibration of a single radio unit across the frequency plan.

use std::sync::Arc;

use dualcal_core::config::CalibrationConfig;
use dualcal_core::domain::{
    ChannelMeasurement, FrequencyFailure, FrequencyMeasurement, FrequencyPlan,
    UnitCalibrationResult, UnitId, UnitStatus,
};
use dualcal_core::error::MeasurementError;
use dualcal_core::port::{MeasurementPort, MeasurementRequest};
use ndarray::Array2;
use num_complex::Complex64;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::arbiter::NoiseSourceArbiter;

/// Drives one unit through every frequency of a plan.
///
/// A failed frequency is recorded and skipped; the unit only fails when no
/// frequency succeeds.
#[derive(Clone)]
pub struct UnitCalibrator {
    port: Arc<dyn MeasurementPort>,
}

impl UnitCalibrator {
    /// Calibrator that measures through `port`.
    pub fn new(port: Arc<dyn MeasurementPort>) -> Self {
        Self { port }
    }

    /// Calibrate `unit_id` on its own, walking the plan from the start.
    pub async fn calibrate(
        &self,
        unit_id: UnitId,
        config: &CalibrationConfig,
        plan: &FrequencyPlan,
    ) -> UnitCalibrationResult {
        let arbiter = NoiseSourceArbiter::new(plan.len());
        self.calibrate_with(unit_id, config, plan, &arbiter, 0).await
    }

    /// Calibrate `unit_id` alongside other units sharing `arbiter`, starting
    /// the walk at plan index `start`.
    pub async fn calibrate_with(
        &self,
        unit_id: UnitId,
        config: &CalibrationConfig,
        plan: &FrequencyPlan,
        arbiter: &NoiseSourceArbiter,
        start: usize,
    ) -> UnitCalibrationResult {
        let span = info_span!("unit_calibration", unit = %unit_id, frequencies = plan.len());
        self.walk_plan(unit_id, config, plan, arbiter, start)
            .instrument(span)
            .await
    }

    async fn walk_plan(
        &self,
        unit_id: UnitId,
        config: &CalibrationConfig,
        plan: &FrequencyPlan,
        arbiter: &NoiseSourceArbiter,
        start: usize,
    ) -> UnitCalibrationResult {
        let started = Instant::now();
        let frequencies = plan.frequencies();
        let mut measurements = Vec::with_capacity(frequencies.len());
        let mut failures = Vec::new();

        for index in arbiter.walk(start) {
            let frequency_hz = frequencies[index];
            let _slot = arbiter.acquire(index).await;
            match self.measure_one(unit_id, config, frequency_hz).await {
                Ok(measurement) => measurements.push(FrequencyMeasurement {
                    frequency_hz,
                    measurement,
                }),
                Err(err) => {
                    debug!(frequency_hz, error = %err, "measurement failed");
                    failures.push(FrequencyFailure {
                        frequency_hz,
                        reason: err.to_string(),
                    });
                }
            }
        }

        measurements.sort_by(|a, b| a.frequency_hz.total_cmp(&b.frequency_hz));
        failures.sort_by(|a, b| a.frequency_hz.total_cmp(&b.frequency_hz));
        let elapsed = started.elapsed();

        if measurements.is_empty() {
            let reason = match failures.first() {
                Some(first) => format!(
                    "no frequency succeeded ({} failed; first at {} Hz: {})",
                    failures.len(),
                    first.frequency_hz,
                    first.reason
                ),
                None => "no frequency succeeded".to_owned(),
            };
            warn!(%reason, "unit calibration failed");
            let mut result = UnitCalibrationResult::failed(unit_id, reason, elapsed);
            result.failures = failures;
            return result;
        }

        let channel_gains = channel_means(&measurements, |m| &m.measurement.gains);
        let phase_offsets_rad = channel_means(&measurements, |m| &m.measurement.phases_rad);
        let noise_floor_db = measurements
            .iter()
            .map(|m| m.measurement.noise_floor_db)
            .sum::<f64>()
            / measurements.len() as f64;
        let calibration_matrix =
            build_calibration_matrix(&channel_gains, &phase_offsets_rad, config.cross_coupling);

        info!(
            succeeded = measurements.len(),
            failed = failures.len(),
            noise_floor_db,
            elapsed_ms = elapsed.as_millis() as u64,
            "unit calibrated"
        );

        UnitCalibrationResult {
            unit_id,
            measurements,
            failures,
            channel_gains,
            phase_offsets_rad,
            noise_floor_db: Some(noise_floor_db),
            calibration_matrix,
            elapsed,
            status: UnitStatus::Success,
            shared_reference_applied: false,
        }
    }

    async fn measure_one(
        &self,
        unit_id: UnitId,
        config: &CalibrationConfig,
        frequency_hz: f64,
    ) -> Result<ChannelMeasurement, MeasurementError> {
        let request = MeasurementRequest::from_config(config, unit_id, frequency_hz);
        let budget = config.measurement_budget();

        let measurement = tokio::time::timeout(budget, self.port.measure(&request))
            .await
            .map_err(|_| MeasurementError::Timeout {
                budget_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            })??;

        measurement
            .check(config.antenna_count)
            .map_err(MeasurementError::invalid_response)?;
        Ok(measurement)
    }
}

/// Per-channel arithmetic mean over `measurements`.
///
/// Every measurement has passed the channel-count check, so all vectors
/// have the same length.
fn channel_means<F>(measurements: &[FrequencyMeasurement], field: F) -> Vec<f64>
where
    F: Fn(&FrequencyMeasurement) -> &Vec<f64>,
{
    let channels = measurements.first().map_or(0, |m| field(m).len());
    let mut sums = vec![0.0; channels];
    for m in measurements {
        for (sum, value) in sums.iter_mut().zip(field(m)) {
            *sum += value;
        }
    }
    let n = measurements.len() as f64;
    sums.into_iter().map(|s| s / n).collect()
}

/// Build the `A × A` correction matrix from per-channel gain and phase.
///
/// Row `i` carries the channel term `g_i · e^{jφ_i}`: on the diagonal as
/// is, off the diagonal attenuated by `cross_coupling`.
#[must_use]
pub fn build_calibration_matrix(
    gains: &[f64],
    phases_rad: &[f64],
    cross_coupling: f64,
) -> Array2<Complex64> {
    let n = gains.len().min(phases_rad.len());
    Array2::from_shape_fn((n, n), |(i, j)| {
        let term = Complex64::from_polar(gains[i], phases_rad[i]);
        if i == j {
            term
        } else {
            term * cross_coupling
        }
    })
}
