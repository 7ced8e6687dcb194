//! Frequency planning.
//!
//! Two strategies:
//!
//! - **Fixed step**: `f_lo, f_lo + step, ...` up to and including the last
//!   value `<= f_hi`.
//! - **Signal informed**: local maxima of a pre-scan power spectrum that
//!   clear both an absolute threshold and a multiple of the spectrum's
//!   percentile noise floor. Falls back to fixed step when nothing
//!   survives, so a plan is never empty.

use dualcal_core::config::{CalibrationConfig, PlanMode, PlannerTuning};
use dualcal_core::domain::{FrequencyPlan, PlanSource, SpectrumHint};
use dualcal_core::error::{PlanError, PlanResult};
use tracing::{debug, warn};

/// Slack on the point-count division so `(hi - lo) / step` landing a hair
/// below an integer still includes the endpoint.
const STEP_EPSILON: f64 = 1e-9;

/// Derives the [`FrequencyPlan`] for a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrequencyPlanner;

impl FrequencyPlanner {
    /// Create a planner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Plan the calibration frequencies for `config`.
    ///
    /// The spectrum hint is used only in [`PlanMode::SignalInformed`]; a
    /// signal-informed config without a usable hint (absent, or failing
    /// [`SpectrumHint::check`]) falls back to fixed step.
    ///
    /// # Errors
    ///
    /// [`PlanError::InvalidRange`] for a non-finite or empty range, a step
    /// `<= 0` (when a sweep is needed), or a sweep longer than
    /// `planner.max_plan_points`.
    pub fn plan(
        &self,
        config: &CalibrationConfig,
        hint: Option<&SpectrumHint>,
    ) -> PlanResult<FrequencyPlan> {
        let (lo, hi) = (config.freq_lo_hz, config.freq_hi_hz);
        if !lo.is_finite() || !hi.is_finite() || lo >= hi {
            return Err(PlanError::invalid_range(
                lo,
                hi,
                config.freq_step_hz,
                "range must be finite with freq_lo_hz < freq_hi_hz",
            ));
        }

        match (config.plan_mode, hint) {
            (PlanMode::SignalInformed, Some(hint)) => {
                if let Err(err) = hint.check() {
                    warn!(error = %err, "spectrum hint rejected; using fixed step");
                    return fixed_step_plan(config, PlanSource::FixedStepFallback);
                }
                let peaks = select_peaks(hint, lo, hi, &config.planner);
                if peaks.is_empty() {
                    debug!(bins = hint.len(), "no spectrum peak survived filtering");
                    fixed_step_plan(config, PlanSource::FixedStepFallback)
                } else {
                    debug!(peaks = peaks.len(), "signal-informed plan");
                    FrequencyPlan::new(peaks, PlanSource::SignalInformed)
                }
            }
            (PlanMode::SignalInformed, None) => {
                warn!("signal-informed planning requested without a spectrum; using fixed step");
                fixed_step_plan(config, PlanSource::FixedStepFallback)
            }
            (PlanMode::FixedStep, hint) => {
                if hint.is_some() {
                    debug!("fixed-step mode ignores the supplied spectrum");
                }
                fixed_step_plan(config, PlanSource::FixedStep)
            }
        }
    }
}

fn fixed_step_plan(config: &CalibrationConfig, source: PlanSource) -> PlanResult<FrequencyPlan> {
    let frequencies = fixed_step(
        config.freq_lo_hz,
        config.freq_hi_hz,
        config.freq_step_hz,
        config.planner.max_plan_points,
    )?;
    FrequencyPlan::new(frequencies, source)
}

/// Regular sweep of `floor((hi - lo) / step) + 1` points starting at `lo`.
///
/// # Errors
///
/// [`PlanError::InvalidRange`] if `step` is not finite and positive, the
/// range is empty, or the sweep would exceed `max_points`.
pub fn fixed_step(lo: f64, hi: f64, step: f64, max_points: usize) -> PlanResult<Vec<f64>> {
    if !(step.is_finite() && step > 0.0) {
        return Err(PlanError::invalid_range(lo, hi, step, "step must be finite and > 0"));
    }
    if !lo.is_finite() || !hi.is_finite() || lo >= hi {
        return Err(PlanError::invalid_range(lo, hi, step, "range yields zero points"));
    }

    let intervals = ((hi - lo) / step + STEP_EPSILON).floor();
    if intervals + 1.0 > max_points as f64 {
        return Err(PlanError::invalid_range(
            lo,
            hi,
            step,
            format!("sweep exceeds the {max_points}-point limit"),
        ));
    }

    // Bounded by max_points above.
    let count = intervals as usize + 1;
    Ok((0..count)
        .map(|i| (lo + i as f64 * step).min(hi))
        .collect())
}

/// Frequencies of spectrum bins that are local maxima, clear the absolute
/// threshold and the noise-floor filter, and lie inside `[lo, hi]`.
///
/// Output is in ascending bin order.
#[must_use]
pub fn select_peaks(hint: &SpectrumHint, lo: f64, hi: f64, tuning: &PlannerTuning) -> Vec<f64> {
    let Some(floor) = percentile(&hint.power, tuning.noise_floor_percentile) else {
        return Vec::new();
    };
    let floor_gate = tuning.noise_floor_multiplier * floor;

    detect_peaks(&hint.power, tuning.peak_threshold)
        .into_iter()
        .filter(|&bin| hint.power[bin] > floor_gate)
        .map(|bin| hint.frequency_of(bin))
        .filter(|f| (lo..=hi).contains(f))
        .collect()
}

/// Indices of bins whose power exceeds both neighbours and `threshold`.
///
/// The first and last bin have only one neighbour and are never peaks.
#[must_use]
pub fn detect_peaks(power: &[f64], threshold: f64) -> Vec<usize> {
    power
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0] && w[1] > w[2] && w[1] > threshold)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Percentile with linear interpolation between closest ranks.
///
/// Returns `None` for an empty slice.
#[must_use]
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    let frac = rank - below as f64;
    Some(sorted[below] + (sorted[above] - sorted[below]) * frac)
}
