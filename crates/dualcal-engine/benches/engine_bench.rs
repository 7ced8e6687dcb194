//! Benchmarks for planning, spectrum analysis and fusion
//!
//! Run with: cargo bench --package dualcal-engine

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use num_complex::Complex64;

use dualcal_core::config::{CalibrationConfig, PlanMode};
use dualcal_core::domain::{
    ChannelMeasurement, FrequencyMeasurement, SpectrumHint, UnitCalibrationResult, UnitId,
    UnitStatus,
};
use dualcal_engine::{build_calibration_matrix, FrequencyPlanner, SharedReferenceFuser};

/// Spectrum with a comb of tones over a gently sloped noise floor.
fn create_spectrum(bins: usize) -> SpectrumHint {
    let power = (0..bins)
        .map(|k| {
            let floor = 0.05 + 0.01 * ((k as f64) * 0.013).sin().abs();
            if k % 97 == 48 {
                5.0
            } else {
                floor
            }
        })
        .collect();
    SpectrumHint {
        start_hz: 50e6,
        bin_width_hz: 150e6 / bins as f64,
        power,
    }
}

fn create_unit(id: u16, channels: usize) -> UnitCalibrationResult {
    let gains: Vec<f64> = (0..channels).map(|c| 1.0 + 0.01 * c as f64).collect();
    let phases: Vec<f64> = (0..channels)
        .map(|c| 0.1 * f64::from(id + 1) * c as f64)
        .collect();
    UnitCalibrationResult {
        unit_id: UnitId(id),
        measurements: vec![FrequencyMeasurement {
            frequency_hz: 100e6,
            measurement: ChannelMeasurement {
                gains: gains.clone(),
                phases_rad: phases.clone(),
                noise_floor_db: -80.0 + f64::from(id),
            },
        }],
        failures: Vec::new(),
        calibration_matrix: build_calibration_matrix(&gains, &phases, 0.1),
        channel_gains: gains,
        phase_offsets_rad: phases,
        noise_floor_db: Some(-80.0 + f64::from(id)),
        elapsed: Duration::from_secs(1),
        status: UnitStatus::Success,
        shared_reference_applied: false,
    }
}

/// Benchmark fixed-step plan generation
fn bench_fixed_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("Fixed-step Planning");
    let planner = FrequencyPlanner::new();

    for &step in &[5e6, 1e6, 10e3] {
        let config = CalibrationConfig {
            freq_step_hz: step,
            ..Default::default()
        };
        let points = (150e6 / step) as u64 + 1;
        group.throughput(Throughput::Elements(points));
        group.bench_with_input(BenchmarkId::new("plan", points), &config, |b, config| {
            b.iter(|| planner.plan(black_box(config), None).unwrap());
        });
    }

    group.finish();
}

/// Benchmark peak-driven planning over increasingly fine spectra
fn bench_signal_informed(c: &mut Criterion) {
    let mut group = c.benchmark_group("Signal-informed Planning");
    let planner = FrequencyPlanner::new();
    let config = CalibrationConfig {
        plan_mode: PlanMode::SignalInformed,
        ..Default::default()
    };

    for &bins in &[1024, 8192, 65536] {
        let spectrum = create_spectrum(bins);
        group.throughput(Throughput::Elements(bins as u64));
        group.bench_with_input(BenchmarkId::new("plan", bins), &spectrum, |b, spectrum| {
            b.iter(|| planner.plan(black_box(&config), Some(black_box(spectrum))).unwrap());
        });
    }

    group.finish();
}

/// Benchmark the FFT pre-scan
fn bench_spectrum_from_iq(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pre-scan Spectrum");

    for &fft_size in &[1024, 4096, 16384] {
        let samples: Vec<Complex64> = (0..fft_size)
            .map(|n| Complex64::from_polar(1.0, 0.37 * n as f64))
            .collect();
        group.bench_with_input(
            BenchmarkId::new("from_iq_samples", fft_size),
            &samples,
            |b, samples| {
                b.iter(|| {
                    SpectrumHint::from_iq_samples(black_box(samples), 100e6, 2.048e6, fft_size)
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

/// Benchmark shared-reference fusion
fn bench_fuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("Shared-reference Fusion");
    let fuser = SharedReferenceFuser::new(true, 0.1);

    for &(units, channels) in &[(2_u16, 4_usize), (8, 8), (32, 16)] {
        let results: Vec<UnitCalibrationResult> =
            (0..units).map(|id| create_unit(id, channels)).collect();
        group.bench_with_input(
            BenchmarkId::new("fuse", format!("{units}x{channels}")),
            &results,
            |b, results| {
                b.iter(|| fuser.fuse(black_box(results.clone()), true));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fixed_step,
    bench_signal_informed,
    bench_spectrum_from_iq,
    bench_fuse,
);
criterion_main!(benches);
