//! Replays measurements recorded from real hardware.
//!
//! Capture format:
//!
//! ```json
//! {
//!   "units": {
//!     "0": [
//!       { "frequency_hz": 50000000.0, "gains": [1.0, 0.98],
//!         "phases_rad": [0.0, 0.12], "noise_floor_db": -80.1 }
//!     ]
//!   }
//! }
//! ```
//!
//! Unit keys are unit indices (`"0"`) or display names (`"unit-0"`). A
//! request is answered with the recorded entry nearest in frequency, if it
//! lies within the tolerance. Nothing is ever synthesised.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use dualcal_core::domain::{ChannelMeasurement, FrequencyMeasurement, UnitId};
use dualcal_core::error::MeasurementError;
use dualcal_core::port::{MeasurementPort, MeasurementRequest};
use serde::{Deserialize, Serialize};

use crate::error::ReplayError;

/// On-disk capture layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayCapture {
    pub units: BTreeMap<String, Vec<FrequencyMeasurement>>,
}

/// [`MeasurementPort`] backed by a [`ReplayCapture`].
#[derive(Debug, Clone)]
pub struct ReplayMeasurementPort {
    units: HashMap<UnitId, Vec<FrequencyMeasurement>>,
    tolerance_hz: f64,
}

impl ReplayMeasurementPort {
    /// Load a capture file.
    ///
    /// # Errors
    ///
    /// [`ReplayError`] if the file cannot be read or parsed, or holds an
    /// invalid unit key or frequency.
    pub fn from_file(path: &Path, tolerance_hz: f64) -> Result<Self, ReplayError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ReplayError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let capture: ReplayCapture = serde_json::from_str(&contents)?;
        Self::from_capture(capture, tolerance_hz)
    }

    /// Serve an in-memory capture.
    ///
    /// # Errors
    ///
    /// [`ReplayError::InvalidUnit`] or [`ReplayError::InvalidFrequency`].
    pub fn from_capture(capture: ReplayCapture, tolerance_hz: f64) -> Result<Self, ReplayError> {
        let mut units = HashMap::with_capacity(capture.units.len());
        for (key, mut entries) in capture.units {
            let unit_id: UnitId = key
                .parse()
                .map_err(|_| ReplayError::InvalidUnit { key: key.clone() })?;
            if entries.iter().any(|e| !e.frequency_hz.is_finite()) {
                return Err(ReplayError::InvalidFrequency { unit: key });
            }
            entries.sort_by(|a, b| a.frequency_hz.total_cmp(&b.frequency_hz));
            units.entry(unit_id).or_insert_with(Vec::new).extend(entries);
        }
        Ok(Self {
            units,
            tolerance_hz: tolerance_hz.abs(),
        })
    }

    /// Largest frequency distance still treated as a match.
    #[must_use]
    pub fn tolerance_hz(&self) -> f64 {
        self.tolerance_hz
    }

    /// Units present in the capture, ascending.
    #[must_use]
    pub fn unit_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<_> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn nearest(&self, unit_id: UnitId, frequency_hz: f64) -> Option<&ChannelMeasurement> {
        self.units
            .get(&unit_id)?
            .iter()
            .map(|e| ((e.frequency_hz - frequency_hz).abs(), e))
            .filter(|(distance, _)| *distance <= self.tolerance_hz)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, e)| &e.measurement)
    }
}

#[async_trait]
impl MeasurementPort for ReplayMeasurementPort {
    async fn measure(
        &self,
        request: &MeasurementRequest,
    ) -> Result<ChannelMeasurement, MeasurementError> {
        self.nearest(request.unit_id, request.frequency_hz)
            .cloned()
            .ok_or(MeasurementError::Unavailable {
                unit_id: request.unit_id,
                frequency_hz: request.frequency_hz,
            })
    }
}
