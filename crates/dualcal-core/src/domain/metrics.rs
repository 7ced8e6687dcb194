//! Timing and counters reported alongside a calibration run.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::measurement::UnitId;
use super::plan::FrequencyPlan;
use super::result::FusedCalibrationResult;

/// Wall time spent in one named phase of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub name: String,
    pub elapsed: Duration,
}

/// Wall time spent calibrating one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTiming {
    pub unit_id: UnitId,
    pub elapsed: Duration,
    pub success: bool,
}

/// Measurement counters summed over every unit in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementCounts {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Performance summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub run_id: Uuid,
    pub total: Duration,
    pub units: Vec<UnitTiming>,
    /// Sum of unit times: what a strictly sequential run would have taken.
    pub sequential_estimate: Duration,
    /// `(sequential_estimate - calibrate phase) / sequential_estimate * 100`,
    /// zero when nothing was calibrated.
    pub parallel_savings_pct: f64,
    pub measurements: MeasurementCounts,
    pub cache_hit: bool,
    pub cache_write_failed: bool,
    pub phases: Vec<PhaseTiming>,
    /// Phases that took more than a fifth of the total, formatted for humans.
    pub bottlenecks: Vec<String>,
}

impl RunMetrics {
    /// Wall time of the named phase, if it ran.
    #[must_use]
    pub fn phase(&self, name: &str) -> Option<Duration> {
        self.phases.iter().find(|p| p.name == name).map(|p| p.elapsed)
    }
}

impl fmt::Display for RunMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Calibration run {}", self.run_id)?;
        writeln!(f, "  total time:          {:.3}s", self.total.as_secs_f64())?;
        if self.cache_hit {
            writeln!(f, "  cache:               hit (no hardware access)")?;
            return Ok(());
        }
        for unit in &self.units {
            writeln!(
                f,
                "  {:<20} {:.3}s ({})",
                format!("{}:", unit.unit_id),
                unit.elapsed.as_secs_f64(),
                if unit.success { "ok" } else { "FAILED" }
            )?;
        }
        writeln!(
            f,
            "  sequential estimate: {:.3}s",
            self.sequential_estimate.as_secs_f64()
        )?;
        writeln!(f, "  parallel savings:    {:.1}%", self.parallel_savings_pct)?;
        writeln!(
            f,
            "  measurements:        {} attempted, {} ok, {} failed",
            self.measurements.attempted, self.measurements.succeeded, self.measurements.failed
        )?;
        if self.cache_write_failed {
            writeln!(f, "  cache:               write failed")?;
        }
        if self.bottlenecks.is_empty() {
            writeln!(f, "  bottlenecks:         none")?;
        } else {
            writeln!(f, "  bottlenecks:         {}", self.bottlenecks.join(", "))?;
        }
        Ok(())
    }
}

/// What a successful run hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub result: FusedCalibrationResult,
    pub metrics: RunMetrics,
    /// The plan that was measured; `None` on a cache hit.
    pub plan: Option<FrequencyPlan>,
}
