//! Pre-scan power spectrum used for signal-informed planning.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

/// A sampled power spectrum on a uniform frequency grid.
///
/// Bin `k` is centred at `start_hz + k * bin_width_hz`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumHint {
    /// Frequency of bin 0 in Hz.
    pub start_hz: f64,
    /// Spacing between adjacent bins in Hz.
    pub bin_width_hz: f64,
    /// Linear power per bin.
    pub power: Vec<f64>,
}

impl SpectrumHint {
    /// Build a hint from an explicit grid.
    ///
    /// # Errors
    ///
    /// [`PlanError::InvalidSpectrum`] if the grid is not finite, the bin
    /// width is not positive, or any power value is not finite.
    pub fn new(start_hz: f64, bin_width_hz: f64, power: Vec<f64>) -> PlanResult<Self> {
        let hint = Self {
            start_hz,
            bin_width_hz,
            power,
        };
        hint.check()?;
        Ok(hint)
    }

    /// Compute `|FFT|²` of the first `fft_size` complex baseband samples.
    ///
    /// Short captures are zero-padded. The output is fft-shifted, so bins
    /// run in ascending absolute frequency with bin `k` at
    /// `center_hz + (k - fft_size / 2) * sample_rate_hz / fft_size`.
    ///
    /// # Errors
    ///
    /// [`PlanError::InvalidSpectrum`] if `fft_size` is zero or the centre
    /// frequency or sample rate is unusable.
    pub fn from_iq_samples(
        samples: &[Complex<f64>],
        center_hz: f64,
        sample_rate_hz: f64,
        fft_size: usize,
    ) -> PlanResult<Self> {
        if fft_size == 0 {
            return Err(PlanError::invalid_spectrum("fft_size must be > 0"));
        }
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) || !center_hz.is_finite() {
            return Err(PlanError::invalid_spectrum(
                "center and sample rate must be finite, sample rate > 0",
            ));
        }

        let mut buffer: Vec<Complex<f64>> = samples.iter().take(fft_size).copied().collect();
        buffer.resize(fft_size, Complex::new(0.0, 0.0));

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        fft.process(&mut buffer);

        let half = fft_size / 2;
        let power: Vec<f64> = (0..fft_size)
            .map(|k| buffer[(k + half) % fft_size].norm_sqr())
            .collect();

        let bin_width_hz = sample_rate_hz / fft_size as f64;
        Self::new(center_hz - half as f64 * bin_width_hz, bin_width_hz, power)
    }

    /// Centre frequency of bin `bin`.
    #[must_use]
    pub fn frequency_of(&self, bin: usize) -> f64 {
        self.start_hz + bin as f64 * self.bin_width_hz
    }

    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.power.len()
    }

    /// `true` if the spectrum has no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }

    /// Re-check a hint that was deserialized or built by hand.
    ///
    /// # Errors
    ///
    /// See [`SpectrumHint::new`].
    pub fn check(&self) -> PlanResult<()> {
        if !self.start_hz.is_finite() {
            return Err(PlanError::invalid_spectrum("start_hz must be finite"));
        }
        if !(self.bin_width_hz.is_finite() && self.bin_width_hz > 0.0) {
            return Err(PlanError::invalid_spectrum("bin_width_hz must be finite and > 0"));
        }
        if let Some(i) = self.power.iter().position(|p| !p.is_finite()) {
            return Err(PlanError::invalid_spectrum(format!("non-finite power in bin {i}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn explicit_grid_maps_bins() {
        let hint = SpectrumHint::new(100e6, 1e6, vec![0.0; 5]).unwrap();
        assert_eq!(hint.len(), 5);
        assert_abs_diff_eq!(hint.frequency_of(0), 100e6);
        assert_abs_diff_eq!(hint.frequency_of(4), 104e6);
    }

    #[test]
    fn rejects_bad_grids() {
        assert!(SpectrumHint::new(0.0, 0.0, vec![1.0]).is_err());
        assert!(SpectrumHint::new(f64::NAN, 1.0, vec![1.0]).is_err());
        assert!(SpectrumHint::new(0.0, 1.0, vec![1.0, f64::INFINITY]).is_err());
        assert!(SpectrumHint::from_iq_samples(&[], 0.0, 1.0, 0).is_err());
    }

    #[test]
    fn tone_lands_in_expected_bin() {
        // A complex tone at +fs/8 over 64 bins sits 8 bins above centre.
        let n = 64;
        let fs = 1.024e6;
        let center = 100e6;
        let samples: Vec<Complex<f64>> = (0..n)
            .map(|i| Complex::from_polar(1.0, 2.0 * PI * (i as f64) / 8.0))
            .collect();

        let hint = SpectrumHint::from_iq_samples(&samples, center, fs, n).unwrap();
        assert_eq!(hint.len(), n);
        assert_abs_diff_eq!(hint.start_hz, center - fs / 2.0);

        let peak = hint
            .power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, n / 2 + 8);
        assert_abs_diff_eq!(hint.frequency_of(peak), center + fs / 8.0, epsilon = 1e-6);
        assert_abs_diff_eq!(hint.power[peak], (n * n) as f64, epsilon = 1e-6);
    }

    #[test]
    fn short_capture_is_zero_padded() {
        let samples = vec![Complex::new(1.0, 0.0); 4];
        let hint = SpectrumHint::from_iq_samples(&samples, 0.0, 8.0, 8).unwrap();
        // DC bin after the shift holds |sum|² = 16.
        assert_abs_diff_eq!(hint.power[4], 16.0, epsilon = 1e-9);
    }
}
