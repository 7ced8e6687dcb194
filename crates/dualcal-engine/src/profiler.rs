//! Phase timing for a calibration run.

use std::future::Future;
use std::time::Duration;

use dualcal_core::domain::{
    MeasurementCounts, PhaseTiming, RunMetrics, UnitCalibrationResult, UnitTiming,
};
use tokio::time::Instant;
use uuid::Uuid;

/// Phase names recorded by the orchestrator.
pub mod phase {
    pub const CACHE_LOOKUP: &str = "cache_lookup";
    pub const PLAN: &str = "plan";
    pub const CALIBRATE: &str = "calibrate";
    pub const FUSE: &str = "fuse";
    pub const CACHE_STORE: &str = "cache_store";
}

/// Share of total run time above which a phase is reported as a bottleneck.
pub const BOTTLENECK_SHARE: f64 = 0.2;

/// Records named phase timings and turns them into [`RunMetrics`].
#[derive(Debug)]
pub struct CalibrationProfiler {
    run_id: Uuid,
    started: Instant,
    phases: Vec<PhaseTiming>,
}

impl CalibrationProfiler {
    /// Start profiling run `run_id`.
    #[must_use]
    pub fn start(run_id: Uuid) -> Self {
        Self {
            run_id,
            started: Instant::now(),
            phases: Vec::new(),
        }
    }

    /// Record `elapsed` against `name`.
    pub fn record(&mut self, name: &str, elapsed: Duration) {
        self.phases.push(PhaseTiming {
            name: name.to_owned(),
            elapsed,
        });
    }

    /// Run `f` as phase `name`.
    pub fn time<T>(&mut self, name: &str, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let out = f();
        self.record(name, started.elapsed());
        out
    }

    /// Await `fut` as phase `name`.
    pub async fn time_async<F: Future>(&mut self, name: &str, fut: F) -> F::Output {
        let started = Instant::now();
        let out = fut.await;
        self.record(name, started.elapsed());
        out
    }

    /// Recorded phases in order.
    #[must_use]
    pub fn phases(&self) -> &[PhaseTiming] {
        &self.phases
    }

    /// Phases that took more than [`BOTTLENECK_SHARE`] of `total`.
    #[must_use]
    pub fn bottlenecks(&self, total: Duration) -> Vec<String> {
        let total_secs = total.as_secs_f64();
        if total_secs <= 0.0 {
            return Vec::new();
        }
        self.phases
            .iter()
            .filter(|p| p.elapsed.as_secs_f64() / total_secs > BOTTLENECK_SHARE)
            .map(|p| {
                let secs = p.elapsed.as_secs_f64();
                format!("{}: {secs:.2}s ({:.1}%)", p.name, secs / total_secs * 100.0)
            })
            .collect()
    }

    /// Stop the clock and summarise the run.
    #[must_use]
    pub fn finish(
        self,
        units: &[UnitCalibrationResult],
        cache_hit: bool,
        cache_write_failed: bool,
    ) -> RunMetrics {
        let total = self.started.elapsed();
        self.summarise(total, units, cache_hit, cache_write_failed)
    }

    fn summarise(
        self,
        total: Duration,
        units: &[UnitCalibrationResult],
        cache_hit: bool,
        cache_write_failed: bool,
    ) -> RunMetrics {
        let unit_timings: Vec<UnitTiming> = units
            .iter()
            .map(|u| UnitTiming {
                unit_id: u.unit_id,
                elapsed: u.elapsed,
                success: u.is_success(),
            })
            .collect();
        let sequential_estimate: Duration = unit_timings.iter().map(|u| u.elapsed).sum();

        let calibrate = self
            .phases
            .iter()
            .filter(|p| p.name == phase::CALIBRATE)
            .map(|p| p.elapsed)
            .sum::<Duration>();
        let parallel_savings_pct = savings_pct(sequential_estimate, calibrate);

        let succeeded: usize = units.iter().map(|u| u.measurements.len()).sum();
        let failed: usize = units.iter().map(|u| u.failures.len()).sum();

        RunMetrics {
            run_id: self.run_id,
            total,
            units: unit_timings,
            sequential_estimate,
            parallel_savings_pct,
            measurements: MeasurementCounts {
                attempted: succeeded + failed,
                succeeded,
                failed,
            },
            cache_hit,
            cache_write_failed,
            bottlenecks: self.bottlenecks(total),
            phases: self.phases,
        }
    }
}

/// `(sequential - actual) / sequential * 100`, floored at zero.
fn savings_pct(sequential: Duration, actual: Duration) -> f64 {
    let seq = sequential.as_secs_f64();
    if seq <= 0.0 {
        return 0.0;
    }
    ((seq - actual.as_secs_f64()) / seq * 100.0).max(0.0)
}
