//! Deterministic measurement port shared by the integration tests.
//!
//! Values are fixed functions of unit and channel; there is no randomness.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dualcal_core::config::CalibrationConfig;
use dualcal_core::domain::{ChannelMeasurement, UnitId};
use dualcal_core::error::MeasurementError;
use dualcal_core::port::{MeasurementPort, MeasurementRequest};
use parking_lot::Mutex;

/// Noise floor reported by `unit`: -80.0, -79.5, -79.0, ...
pub fn noise_floor_of(unit: UnitId) -> f64 {
    -80.0 + 0.5 * f64::from(unit.0)
}

/// Gain reported by `unit` on `channel`.
pub fn gain_of(unit: UnitId, channel: usize) -> f64 {
    1.0 + 0.25 * f64::from(unit.0) + 0.125 * channel as f64
}

/// Phase reported by `unit` on `channel`.
pub fn phase_of(unit: UnitId, channel: usize) -> f64 {
    0.125 * f64::from(unit.0 + 1) * (channel + 1) as f64
}

pub struct TablePort {
    channels: usize,
    delay: Duration,
    failing_units: HashSet<UnitId>,
    panicking_units: HashSet<UnitId>,
    calls: AtomicUsize,
    active: Mutex<HashMap<u64, usize>>,
    max_overlap: AtomicUsize,
}

impl TablePort {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            delay: Duration::ZERO,
            failing_units: HashSet::new(),
            panicking_units: HashSet::new(),
            calls: AtomicUsize::new(0),
            active: Mutex::new(HashMap::new()),
            max_overlap: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_unit(mut self, unit: UnitId) -> Self {
        self.failing_units.insert(unit);
        self
    }

    pub fn panicking_unit(mut self, unit: UnitId) -> Self {
        self.panicking_units.insert(unit);
        self
    }

    /// Total `measure` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most units ever measuring the same frequency at once.
    pub fn max_same_frequency_overlap(&self) -> usize {
        self.max_overlap.load(Ordering::SeqCst)
    }

    fn enter(&self, frequency_hz: f64) {
        let mut active = self.active.lock();
        let count = active.entry(frequency_hz.to_bits()).or_insert(0);
        *count += 1;
        self.max_overlap.fetch_max(*count, Ordering::SeqCst);
    }

    fn leave(&self, frequency_hz: f64) {
        let mut active = self.active.lock();
        if let Some(count) = active.get_mut(&frequency_hz.to_bits()) {
            *count -= 1;
        }
    }
}

#[async_trait]
impl MeasurementPort for TablePort {
    async fn measure(
        &self,
        request: &MeasurementRequest,
    ) -> Result<ChannelMeasurement, MeasurementError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panicking_units.contains(&request.unit_id) {
            panic!("driver crashed for {}", request.unit_id);
        }

        self.enter(request.frequency_hz);
        tokio::time::sleep(self.delay).await;
        self.leave(request.frequency_hz);

        if self.failing_units.contains(&request.unit_id) {
            return Err(MeasurementError::Hardware(format!(
                "{} not responding",
                request.unit_id
            )));
        }
        let unit = request.unit_id;
        Ok(ChannelMeasurement {
            gains: (0..self.channels).map(|c| gain_of(unit, c)).collect(),
            phases_rad: (0..self.channels).map(|c| phase_of(unit, c)).collect(),
            noise_floor_db: noise_floor_of(unit),
        })
    }
}

/// Two units, four channels, fixed 50-200 MHz sweep, short dwell.
pub fn two_unit_config() -> CalibrationConfig {
    CalibrationConfig {
        dwell_ms: 100,
        measurement_grace_ms: 50,
        ..Default::default()
    }
}
