//! Domain types for dual-radio calibration.

pub mod measurement;
pub mod metrics;
pub mod plan;
pub mod record;
pub mod result;
pub mod spectrum;

pub use measurement::{ChannelMeasurement, FrequencyFailure, FrequencyMeasurement, UnitId};
pub use metrics::{MeasurementCounts, PhaseTiming, RunMetrics, RunReport, UnitTiming};
pub use plan::{FrequencyPlan, PlanSource};
pub use record::{CacheRecord, CACHE_SCHEMA_VERSION};
pub use result::{FusedCalibrationResult, SharedReference, UnitCalibrationResult, UnitStatus};
pub use spectrum::SpectrumHint;
