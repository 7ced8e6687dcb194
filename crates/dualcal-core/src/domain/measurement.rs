//! Unit identity and per-frequency measurement value objects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// UnitId -- Value Object
// ---------------------------------------------------------------------------

/// Identifies one radio unit by its index in the configuration.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u16);

impl UnitId {
    /// Zero-based position of this unit in the configuration.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

impl FromStr for UnitId {
    type Err = std::num::ParseIntError;

    /// Accepts either a bare index (`"1"`) or the display form (`"unit-1"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("unit-").unwrap_or(s);
        digits.trim().parse().map(Self)
    }
}

// ---------------------------------------------------------------------------
// ChannelMeasurement -- Value Object
// ---------------------------------------------------------------------------

/// What the driver reports for one unit at one frequency.
///
/// `gains` and `phases_rad` hold one entry per antenna channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMeasurement {
    /// Linear gain estimate per channel.
    pub gains: Vec<f64>,
    /// Phase estimate per channel in radians.
    pub phases_rad: Vec<f64>,
    /// Noise-floor estimate in dB.
    pub noise_floor_db: f64,
}

impl ChannelMeasurement {
    /// Number of channels described by this measurement.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.gains.len()
    }

    /// Check the shape and finiteness against the expected channel count.
    ///
    /// Returns a description of the first problem found.
    pub fn check(&self, expected_channels: usize) -> Result<(), String> {
        if self.gains.len() != expected_channels || self.phases_rad.len() != expected_channels {
            return Err(format!(
                "expected {expected_channels} channels, got {} gains and {} phases",
                self.gains.len(),
                self.phases_rad.len()
            ));
        }
        if let Some(i) = self.gains.iter().position(|g| !g.is_finite()) {
            return Err(format!("non-finite gain on channel {i}"));
        }
        if let Some(i) = self.phases_rad.iter().position(|p| !p.is_finite()) {
            return Err(format!("non-finite phase on channel {i}"));
        }
        if !self.noise_floor_db.is_finite() {
            return Err("non-finite noise floor".to_owned());
        }
        Ok(())
    }
}

/// A [`ChannelMeasurement`] tagged with the frequency it was taken at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyMeasurement {
    /// Centre frequency in Hz.
    pub frequency_hz: f64,
    /// The measurement itself.
    #[serde(flatten)]
    pub measurement: ChannelMeasurement,
}

/// A frequency that produced no usable measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyFailure {
    /// Centre frequency in Hz.
    pub frequency_hz: f64,
    /// Why the measurement was discarded.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_id_display_and_parse() {
        assert_eq!(UnitId(3).to_string(), "unit-3");
        assert_eq!("unit-3".parse::<UnitId>().unwrap(), UnitId(3));
        assert_eq!("7".parse::<UnitId>().unwrap(), UnitId(7));
        assert!("unit-x".parse::<UnitId>().is_err());
    }

    #[test]
    fn check_rejects_wrong_channel_count() {
        let m = ChannelMeasurement {
            gains: vec![1.0, 1.0],
            phases_rad: vec![0.0, 0.0],
            noise_floor_db: -80.0,
        };
        assert!(m.check(2).is_ok());
        assert!(m.check(4).unwrap_err().contains("expected 4 channels"));
    }

    #[test]
    fn check_rejects_non_finite_values() {
        let m = ChannelMeasurement {
            gains: vec![1.0, f64::NAN],
            phases_rad: vec![0.0, 0.0],
            noise_floor_db: -80.0,
        };
        assert!(m.check(2).unwrap_err().contains("gain on channel 1"));

        let m = ChannelMeasurement {
            gains: vec![1.0],
            phases_rad: vec![0.0],
            noise_floor_db: f64::INFINITY,
        };
        assert!(m.check(1).is_err());
    }

    #[test]
    fn frequency_measurement_serializes_flat() {
        let fm = FrequencyMeasurement {
            frequency_hz: 100e6,
            measurement: ChannelMeasurement {
                gains: vec![1.0],
                phases_rad: vec![0.5],
                noise_floor_db: -79.5,
            },
        };
        let json = serde_json::to_value(&fm).unwrap();
        assert_eq!(json["frequency_hz"], 100e6);
        assert_eq!(json["noise_floor_db"], -79.5);
        assert_eq!(json["gains"][0], 1.0);
    }
}
