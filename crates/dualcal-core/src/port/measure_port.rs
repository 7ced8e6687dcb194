//! The driven-side port for per-frequency hardware measurement.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::CalibrationConfig;
use crate::domain::{ChannelMeasurement, UnitId};
use crate::error::MeasurementError;

/// One measurement request: tune `unit_id` to `frequency_hz` and sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRequest {
    pub unit_id: UnitId,
    pub frequency_hz: f64,
    pub dwell: Duration,
    pub sample_count: usize,
    pub gain_db: f64,
    pub sample_rate_hz: f64,
    /// Number of channels the driver is expected to report.
    pub channel_count: usize,
}

impl MeasurementRequest {
    /// Request for `unit_id` at `frequency_hz` using the configuration's
    /// effective dwell, sample count and per-unit gain.
    #[must_use]
    pub fn from_config(config: &CalibrationConfig, unit_id: UnitId, frequency_hz: f64) -> Self {
        Self {
            unit_id,
            frequency_hz,
            dwell: config.effective_dwell(),
            sample_count: config.effective_sample_count(),
            gain_db: config.gain_for_unit(unit_id.index()),
            sample_rate_hz: config.sample_rate_hz,
            channel_count: config.antenna_count,
        }
    }
}

/// Port that abstracts the radio driver.
///
/// Implementations must be safe to call concurrently for different units
/// measuring different frequencies. The engine serialises access to any
/// single frequency across units, so an implementation never sees two
/// concurrent requests for the same frequency.
///
/// Known implementations:
/// - `dualcal_engine::adapter::ReplayMeasurementPort` -- serves recorded
///   measurements from a JSON capture.
#[async_trait]
pub trait MeasurementPort: Send + Sync {
    /// Take one measurement.
    async fn measure(
        &self,
        request: &MeasurementRequest,
    ) -> Result<ChannelMeasurement, MeasurementError>;
}
