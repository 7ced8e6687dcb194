//! Integration tests for frequency planning.

use dualcal_core::config::{CalibrationConfig, PlanMode};
use dualcal_core::domain::{PlanSource, SpectrumHint};
use dualcal_core::error::PlanError;
use dualcal_engine::FrequencyPlanner;

fn config(lo: f64, hi: f64, step: f64) -> CalibrationConfig {
    CalibrationConfig {
        freq_lo_hz: lo,
        freq_hi_hz: hi,
        freq_step_hz: step,
        ..Default::default()
    }
}

fn signal_informed() -> CalibrationConfig {
    CalibrationConfig {
        plan_mode: PlanMode::SignalInformed,
        ..config(50e6, 200e6, 5e6)
    }
}

/// 151 bins of 1 MHz from 50 MHz, power 0.05 everywhere except `peaks`.
fn spectrum(peaks: &[(usize, f64)]) -> SpectrumHint {
    let mut power = vec![0.05; 151];
    for &(bin, p) in peaks {
        power[bin] = p;
    }
    SpectrumHint::new(50e6, 1e6, power).unwrap()
}

// ---------------------------------------------------------------------------
// Fixed step
// ---------------------------------------------------------------------------

#[test]
fn default_sweep_has_31_points() {
    let plan = FrequencyPlanner::new().plan(&config(50e6, 200e6, 5e6), None).unwrap();
    assert_eq!(plan.len(), 31);
    assert_eq!(plan.first(), 50e6);
    assert_eq!(plan.last(), 200e6);
    assert_eq!(plan.source(), PlanSource::FixedStep);
}

#[test]
fn sweep_cardinality_and_ordering_hold_across_ranges() {
    let cases = [
        (0.0, 1.0, 0.3),
        (88e6, 108e6, 0.2e6),
        (1e6, 2e6, 1e6),
        (433.05e6, 434.79e6, 25e3),
        (100.0, 100.5, 1.0),
    ];
    for (lo, hi, step) in cases {
        let plan = FrequencyPlanner::new().plan(&config(lo, hi, step), None).unwrap();
        let expected = ((hi - lo) / step + 1e-9).floor() as usize + 1;
        assert_eq!(plan.len(), expected, "range [{lo}, {hi}] step {step}");
        assert_eq!(plan.first(), lo);
        assert!(plan.last() <= hi);
        assert!(plan.frequencies().windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn non_positive_step_is_invalid_range() {
    for step in [0.0, -5e6] {
        let err = FrequencyPlanner::new()
            .plan(&config(50e6, 200e6, step), None)
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidRange { .. }), "step {step}");
    }
}

#[test]
fn empty_range_is_invalid_range() {
    let err = FrequencyPlanner::new()
        .plan(&config(200e6, 200e6, 5e6), None)
        .unwrap_err();
    assert!(matches!(err, PlanError::InvalidRange { .. }));
}

#[test]
fn oversized_sweep_is_rejected() {
    let mut cfg = config(0.0, 1e9, 1.0);
    cfg.planner.max_plan_points = 1000;
    assert!(FrequencyPlanner::new().plan(&cfg, None).is_err());
}

// ---------------------------------------------------------------------------
// Signal informed
// ---------------------------------------------------------------------------

#[test]
fn strong_peaks_become_the_plan() {
    let hint = spectrum(&[(10, 1.0), (40, 0.8), (100, 2.0)]);
    let plan = FrequencyPlanner::new().plan(&signal_informed(), Some(&hint)).unwrap();
    assert_eq!(plan.source(), PlanSource::SignalInformed);
    assert_eq!(plan.frequencies(), &[60e6, 90e6, 150e6]);
}

#[test]
fn peaks_below_absolute_threshold_are_dropped() {
    let hint = spectrum(&[(10, 0.09), (20, 0.5)]);
    let plan = FrequencyPlanner::new().plan(&signal_informed(), Some(&hint)).unwrap();
    assert_eq!(plan.frequencies(), &[70e6]);
}

#[test]
fn peaks_riding_on_the_noise_floor_are_dropped() {
    // Raised floor of 0.3: a 0.5 bump is a local maximum above the
    // absolute threshold but below twice the floor.
    let mut power = vec![0.3; 151];
    power[30] = 0.5;
    power[60] = 0.9;
    let hint = SpectrumHint::new(50e6, 1e6, power).unwrap();
    let plan = FrequencyPlanner::new().plan(&signal_informed(), Some(&hint)).unwrap();
    assert_eq!(plan.frequencies(), &[110e6]);
}

#[test]
fn peaks_outside_the_range_are_dropped() {
    // Spectrum extends below freq_lo_hz.
    let mut power = vec![0.05; 40];
    power[5] = 1.0; // 35 MHz
    power[25] = 1.0; // 55 MHz
    let hint = SpectrumHint::new(30e6, 1e6, power).unwrap();
    let plan = FrequencyPlanner::new().plan(&signal_informed(), Some(&hint)).unwrap();
    assert_eq!(plan.frequencies(), &[55e6]);
}

#[test]
fn flat_spectrum_falls_back_to_fixed_step() {
    let plan = FrequencyPlanner::new()
        .plan(&signal_informed(), Some(&spectrum(&[])))
        .unwrap();
    assert_eq!(plan.source(), PlanSource::FixedStepFallback);
    assert_eq!(plan.len(), 31);
}

#[test]
fn missing_spectrum_falls_back_to_fixed_step() {
    let plan = FrequencyPlanner::new().plan(&signal_informed(), None).unwrap();
    assert_eq!(plan.source(), PlanSource::FixedStepFallback);
    assert_eq!(plan.len(), 31);
}

#[test]
fn non_finite_spectrum_falls_back_to_fixed_step() {
    let hints = [
        SpectrumHint {
            start_hz: 50e6,
            bin_width_hz: 1e6,
            power: vec![1.0, f64::NAN, 1.0],
        },
        SpectrumHint {
            start_hz: 50e6,
            bin_width_hz: 1e6,
            power: vec![0.05, f64::INFINITY, 0.05],
        },
        SpectrumHint {
            start_hz: f64::NAN,
            bin_width_hz: 1e6,
            power: vec![0.05, 1.0, 0.05],
        },
    ];
    for hint in &hints {
        let plan = FrequencyPlanner::new()
            .plan(&signal_informed(), Some(hint))
            .unwrap();
        assert_eq!(plan.source(), PlanSource::FixedStepFallback);
        assert_eq!(plan.len(), 31);
    }
}

#[test]
fn signal_informed_plan_is_never_empty() {
    let spectra = [
        SpectrumHint::new(50e6, 1e6, vec![]).unwrap(),
        SpectrumHint::new(50e6, 1e6, vec![1.0]).unwrap(),
        SpectrumHint::new(50e6, 1e6, vec![0.0; 151]).unwrap(),
        SpectrumHint::new(50e6, 1e6, (0..151).map(|i| i as f64).collect()).unwrap(),
        SpectrumHint::new(500e6, 1e6, vec![0.0, 5.0, 0.0]).unwrap(),
        spectrum(&[(75, 100.0)]),
    ];
    for hint in &spectra {
        let plan = FrequencyPlanner::new().plan(&signal_informed(), Some(hint)).unwrap();
        assert!(!plan.is_empty());
    }
}

#[test]
fn signal_informed_plan_is_deterministic() {
    let hint = spectrum(&[(3, 0.7), (70, 0.9), (71, 0.2), (149, 1.5)]);
    let a = FrequencyPlanner::new().plan(&signal_informed(), Some(&hint)).unwrap();
    let b = FrequencyPlanner::new().plan(&signal_informed(), Some(&hint)).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.frequencies(), &[53e6, 120e6, 199e6]);
}

#[test]
fn fixed_step_mode_ignores_spectrum() {
    let hint = spectrum(&[(10, 1.0)]);
    let plan = FrequencyPlanner::new()
        .plan(&config(50e6, 200e6, 5e6), Some(&hint))
        .unwrap();
    assert_eq!(plan.source(), PlanSource::FixedStep);
    assert_eq!(plan.len(), 31);
}
