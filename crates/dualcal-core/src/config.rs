//! Calibration configuration.
//!
//! [`CalibrationConfig`] is the only input to a calibration run. It is
//! serializable via [`serde`] and every field carries a default, so a
//! partial JSON file is merged over the defaults on load.
//!
//! # Example
//!
//! ```rust
//! use dualcal_core::config::{CalibrationConfig, CalibrationMode};
//!
//! let cfg = CalibrationConfig::default().with_mode(CalibrationMode::Fast);
//! cfg.validate().expect("fast preset is valid");
//!
//! assert_eq!(cfg.sample_count, 4096);
//! assert_eq!(cfg.freq_step_hz, 10e6);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Samples per measurement when adaptive sampling is enabled.
pub const ADAPTIVE_SAMPLE_CAP: usize = 4096;

/// Dwell per measurement when adaptive sampling is enabled.
pub const ADAPTIVE_DWELL_CAP: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How calibration frequencies are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// `f_lo, f_lo + step, ...` up to `f_hi`.
    #[default]
    FixedStep,
    /// Peaks of a pre-scan spectrum; falls back to fixed-step.
    SignalInformed,
}

/// Speed / accuracy presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    /// 4096 samples per measurement, 10 MHz steps.
    Fast,
    /// Leaves the configuration unchanged.
    #[default]
    Balanced,
    /// 16384 samples per measurement, 1 MHz steps.
    Precise,
}

// ---------------------------------------------------------------------------
// PlannerTuning
// ---------------------------------------------------------------------------

/// Tunables for signal-informed planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerTuning {
    /// Absolute power a bin must exceed to count as a peak. Default: **0.1**.
    pub peak_threshold: f64,

    /// Percentile of the spectrum used as the noise floor estimate.
    /// Default: **10.0**.
    pub noise_floor_percentile: f64,

    /// A peak survives only if its power exceeds
    /// `noise_floor_multiplier × noise floor`. Default: **2.0**.
    pub noise_floor_multiplier: f64,

    /// Upper bound on the number of planned frequencies. Default: **100 000**.
    pub max_plan_points: usize,
}

impl Default for PlannerTuning {
    fn default() -> Self {
        Self {
            peak_threshold: 0.1,
            noise_floor_percentile: 10.0,
            noise_floor_multiplier: 2.0,
            max_plan_points: 100_000,
        }
    }
}

// ---------------------------------------------------------------------------
// CalibrationConfig
// ---------------------------------------------------------------------------

/// Complete configuration for one calibration run.
///
/// Field order is part of the cache fingerprint: reordering fields
/// invalidates existing cache records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    // -----------------------------------------------------------------------
    // Radio
    // -----------------------------------------------------------------------
    /// Sample rate in Hz. Default: **2.048e6**.
    pub sample_rate_hz: f64,

    /// Per-unit receiver gain in dB. A single entry applies to every unit.
    /// Default: **[20.0]**.
    pub unit_gain_db: Vec<f64>,

    /// Number of radio units calibrated together. Default: **2**.
    pub unit_count: usize,

    /// Channels (antennas) per unit; the calibration matrix is
    /// `antenna_count × antenna_count`. Default: **4**.
    pub antenna_count: usize,

    // -----------------------------------------------------------------------
    // Frequency plan
    // -----------------------------------------------------------------------
    /// Lower bound of the calibration range in Hz. Default: **50e6**.
    pub freq_lo_hz: f64,

    /// Upper bound of the calibration range in Hz. Default: **200e6**.
    pub freq_hi_hz: f64,

    /// Fixed-step spacing in Hz. Default: **5e6**.
    pub freq_step_hz: f64,

    /// Fixed-step or signal-informed planning. Default: **fixed_step**.
    pub plan_mode: PlanMode,

    /// Signal-informed planning tunables.
    pub planner: PlannerTuning,

    // -----------------------------------------------------------------------
    // Measurement
    // -----------------------------------------------------------------------
    /// Samples captured per measurement. Default: **8192**.
    pub sample_count: usize,

    /// Dwell per frequency in milliseconds. Default: **1000**.
    pub dwell_ms: u64,

    /// Slack on top of the dwell before a measurement counts as timed out.
    /// Default: **250**.
    pub measurement_grace_ms: u64,

    /// Cap samples and dwell per measurement
    /// ([`ADAPTIVE_SAMPLE_CAP`], [`ADAPTIVE_DWELL_CAP`]). Default: **false**.
    pub adaptive_sampling: bool,

    /// Off-diagonal leakage factor of the calibration matrix. Default: **0.1**.
    pub cross_coupling: f64,

    // -----------------------------------------------------------------------
    // Scheduling and fusion
    // -----------------------------------------------------------------------
    /// Calibrate units concurrently. `None` means "parallel when there are
    /// at least two units". Default: **None**.
    pub parallel: Option<bool>,

    /// Units share a noise source and clock; average noise floor and phase
    /// offsets across them. Default: **true**.
    pub shared_reference: bool,

    /// Rebuild each fused unit's calibration matrix from the shared phase
    /// offsets. Default: **true**.
    pub recompute_matrices: bool,

    // -----------------------------------------------------------------------
    // Cache
    // -----------------------------------------------------------------------
    /// Consult and update the result cache. Default: **true**.
    pub cache_enabled: bool,

    /// Maximum age of a usable cache record in seconds. Default: **3600**.
    pub cache_ttl_seconds: u64,

    /// Location of the cache record. Default: **dualcal_cache.json**.
    pub cache_path: PathBuf,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            // Radio
            sample_rate_hz: 2.048e6,
            unit_gain_db: vec![20.0],
            unit_count: 2,
            antenna_count: 4,
            // Frequency plan
            freq_lo_hz: 50e6,
            freq_hi_hz: 200e6,
            freq_step_hz: 5e6,
            plan_mode: PlanMode::FixedStep,
            planner: PlannerTuning::default(),
            // Measurement
            sample_count: 8192,
            dwell_ms: 1000,
            measurement_grace_ms: 250,
            adaptive_sampling: false,
            cross_coupling: 0.1,
            // Scheduling and fusion
            parallel: None,
            shared_reference: true,
            recompute_matrices: true,
            // Cache
            cache_enabled: true,
            cache_ttl_seconds: 3600,
            cache_path: PathBuf::from("dualcal_cache.json"),
        }
    }
}

impl CalibrationConfig {
    /// Load a configuration from a JSON file, merging it over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid JSON for this schema, and
    /// [`ConfigError::InvalidValue`] if the merged config fails validation.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: CalibrationConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this configuration as pretty-printed JSON, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileWrite`] on any I/O failure.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply a speed / accuracy preset.
    #[must_use]
    pub fn with_mode(mut self, mode: CalibrationMode) -> Self {
        match mode {
            CalibrationMode::Fast => {
                self.sample_count = 4096;
                self.freq_step_hz = 10e6;
            }
            CalibrationMode::Balanced => {}
            CalibrationMode::Precise => {
                self.sample_count = 16384;
                self.freq_step_hz = 1e6;
            }
        }
        self
    }

    /// Whether units are calibrated concurrently.
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.parallel.unwrap_or(self.unit_count >= 2)
    }

    /// Receiver gain for the unit at `index`.
    #[must_use]
    pub fn gain_for_unit(&self, index: usize) -> f64 {
        match self.unit_gain_db.as_slice() {
            [single] => *single,
            gains => gains.get(index).copied().unwrap_or_default(),
        }
    }

    /// Configured dwell per frequency.
    #[must_use]
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    /// Samples requested per measurement after adaptive capping.
    #[must_use]
    pub fn effective_sample_count(&self) -> usize {
        if self.adaptive_sampling {
            self.sample_count.min(ADAPTIVE_SAMPLE_CAP)
        } else {
            self.sample_count
        }
    }

    /// Dwell requested per measurement after adaptive capping.
    #[must_use]
    pub fn effective_dwell(&self) -> Duration {
        if self.adaptive_sampling {
            self.dwell().min(ADAPTIVE_DWELL_CAP)
        } else {
            self.dwell()
        }
    }

    /// Time allowed for a single measurement before it counts as failed.
    #[must_use]
    pub fn measurement_budget(&self) -> Duration {
        self.effective_dwell() + Duration::from_millis(self.measurement_grace_ms)
    }

    /// Validate all fields.
    ///
    /// The frequency step is deliberately not checked here: a non-positive
    /// step surfaces as [`PlanError::InvalidRange`](crate::error::PlanError)
    /// from the planner.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::InvalidValue`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(ConfigError::invalid_value("sample_rate_hz", "must be finite and > 0"));
        }
        if self.unit_count == 0 {
            return Err(ConfigError::invalid_value("unit_count", "must be >= 1"));
        }
        if self.antenna_count == 0 {
            return Err(ConfigError::invalid_value("antenna_count", "must be >= 1"));
        }
        if self.unit_gain_db.len() != 1 && self.unit_gain_db.len() != self.unit_count {
            return Err(ConfigError::invalid_value(
                "unit_gain_db",
                format!(
                    "expected 1 or {} entries, got {}",
                    self.unit_count,
                    self.unit_gain_db.len()
                ),
            ));
        }
        if self.unit_gain_db.iter().any(|g| !g.is_finite()) {
            return Err(ConfigError::invalid_value("unit_gain_db", "gains must be finite"));
        }
        if !self.freq_lo_hz.is_finite() || !self.freq_hi_hz.is_finite() {
            return Err(ConfigError::invalid_value("freq_lo_hz / freq_hi_hz", "must be finite"));
        }
        if self.freq_lo_hz >= self.freq_hi_hz {
            return Err(ConfigError::invalid_value(
                "freq_lo_hz / freq_hi_hz",
                "freq_lo_hz must be < freq_hi_hz",
            ));
        }
        if self.sample_count == 0 {
            return Err(ConfigError::invalid_value("sample_count", "must be > 0"));
        }
        if !(self.cross_coupling.is_finite() && (0.0..=1.0).contains(&self.cross_coupling)) {
            return Err(ConfigError::invalid_value("cross_coupling", "must be in [0.0, 1.0]"));
        }
        let tuning = &self.planner;
        if !(0.0..=100.0).contains(&tuning.noise_floor_percentile) {
            return Err(ConfigError::invalid_value(
                "planner.noise_floor_percentile",
                "must be in [0.0, 100.0]",
            ));
        }
        if !tuning.noise_floor_multiplier.is_finite() || tuning.noise_floor_multiplier < 0.0 {
            return Err(ConfigError::invalid_value(
                "planner.noise_floor_multiplier",
                "must be finite and >= 0.0",
            ));
        }
        if !tuning.peak_threshold.is_finite() {
            return Err(ConfigError::invalid_value("planner.peak_threshold", "must be finite"));
        }
        if tuning.max_plan_points == 0 {
            return Err(ConfigError::invalid_value("planner.max_plan_points", "must be > 0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
