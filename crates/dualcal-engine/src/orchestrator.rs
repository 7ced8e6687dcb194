//! Top-level coordination of a calibration run.
//!
//! A run goes through these phases:
//!
//! 1. **cache_lookup**: a fresh cached record short-circuits the run
//! 2. **plan**: derive the [`FrequencyPlan`]
//! 3. **calibrate**: one [`UnitCalibrator`] per unit, concurrently on a
//!    [`JoinSet`] or one after another
//! 4. **fuse**: [`SharedReferenceFuser`] over every unit result
//! 5. **cache_store**: best-effort write of the fused result
//!
//! The run fails only if the configuration or plan is invalid, or if every
//! unit failed. The cache is touched only before dispatch and after the
//! join, never while units are measuring, and its file I/O runs on the
//! blocking pool.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use dualcal_core::config::CalibrationConfig;
use dualcal_core::domain::{
    CacheRecord, FrequencyPlan, FusedCalibrationResult, RunReport, SpectrumHint,
    UnitCalibrationResult, UnitId,
};
use dualcal_core::error::{CalResult, ConfigError, OrchestrationError};
use dualcal_core::port::MeasurementPort;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::arbiter::NoiseSourceArbiter;
use crate::cache::CalibrationCache;
use crate::calibrator::UnitCalibrator;
use crate::fuser::SharedReferenceFuser;
use crate::planner::FrequencyPlanner;
use crate::profiler::{phase, CalibrationProfiler};

/// Reason recorded for a unit whose task died without returning.
pub const PANICKED_UNIT_REASON: &str = "calibration task panicked";

/// Per-run knobs that are not part of the cached configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Pre-scan spectrum for signal-informed planning.
    pub spectrum_hint: Option<SpectrumHint>,
    /// Measure even if a fresh record exists. The result is still stored.
    pub skip_cache_lookup: bool,
}

/// Coordinates planning, unit calibration, fusion and caching.
///
/// The measurement port and cache are injected; the orchestrator keeps no
/// other state between runs.
#[derive(Clone)]
pub struct CalibrationOrchestrator {
    calibrator: UnitCalibrator,
    cache: Arc<CalibrationCache>,
    planner: FrequencyPlanner,
}

impl CalibrationOrchestrator {
    /// Orchestrator measuring through `port` and caching in `cache`.
    pub fn new(port: Arc<dyn MeasurementPort>, cache: Arc<CalibrationCache>) -> Self {
        Self {
            calibrator: UnitCalibrator::new(port),
            cache,
            planner: FrequencyPlanner::new(),
        }
    }

    /// The cache this orchestrator reads and writes.
    #[must_use]
    pub fn cache(&self) -> &CalibrationCache {
        &self.cache
    }

    /// Run one calibration with default options.
    ///
    /// # Errors
    ///
    /// See [`CalibrationOrchestrator::run_with_options`].
    pub async fn run(&self, config: &CalibrationConfig) -> CalResult<RunReport> {
        self.run_with_options(config, &RunOptions::default()).await
    }

    /// Run one calibration, ignoring any cached record.
    ///
    /// # Errors
    ///
    /// See [`CalibrationOrchestrator::run_with_options`].
    pub async fn refresh(&self, config: &CalibrationConfig) -> CalResult<RunReport> {
        let options = RunOptions {
            skip_cache_lookup: true,
            ..RunOptions::default()
        };
        self.run_with_options(config, &options).await
    }

    /// Run one calibration, giving up after `deadline`.
    ///
    /// On expiry every in-flight unit task is aborted and nothing is
    /// written to the cache.
    ///
    /// # Errors
    ///
    /// [`OrchestrationError::DeadlineExceeded`] on expiry, otherwise as
    /// [`CalibrationOrchestrator::run_with_options`].
    pub async fn run_with_deadline(
        &self,
        config: &CalibrationConfig,
        options: &RunOptions,
        deadline: Duration,
    ) -> CalResult<RunReport> {
        match tokio::time::timeout(deadline, self.run_with_options(config, options)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
                warn!(deadline_ms, "calibration run cancelled at deadline");
                Err(OrchestrationError::DeadlineExceeded { deadline_ms })
            }
        }
    }

    /// Run one calibration.
    ///
    /// # Errors
    ///
    /// - [`OrchestrationError::Config`] if `config` fails validation
    /// - [`OrchestrationError::Plan`] if no frequency plan can be built
    /// - [`OrchestrationError::AllUnitsFailed`] if no unit succeeded
    pub async fn run_with_options(
        &self,
        config: &CalibrationConfig,
        options: &RunOptions,
    ) -> CalResult<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("calibration_run", %run_id, units = config.unit_count);
        self.execute(run_id, config, options).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        config: &CalibrationConfig,
        options: &RunOptions,
    ) -> CalResult<RunReport> {
        config.validate()?;
        let unit_count = u16::try_from(config.unit_count)
            .map_err(|_| ConfigError::invalid_value("unit_count", "must fit in 16 bits"))?;

        let mut profiler = CalibrationProfiler::start(run_id);

        if config.cache_enabled && !options.skip_cache_lookup {
            let cached = profiler
                .time_async(phase::CACHE_LOOKUP, self.lookup_cached(config))
                .await;
            if let Some(record) = cached {
                info!(created_at = %record.created_at, "using cached calibration");
                let metrics = profiler.finish(&[], true, false);
                return Ok(RunReport {
                    result: record.payload,
                    metrics,
                    plan: None,
                });
            }
        }

        let plan = profiler.time(phase::PLAN, || {
            self.planner.plan(config, options.spectrum_hint.as_ref())
        })?;
        info!(
            frequencies = plan.len(),
            first_hz = plan.first(),
            last_hz = plan.last(),
            source = ?plan.source(),
            "frequency plan ready"
        );

        let plan = Arc::new(plan);
        let results = profiler
            .time_async(phase::CALIBRATE, self.calibrate_units(config, &plan, unit_count))
            .await;

        let fuser = SharedReferenceFuser::from_config(config);
        let fused = profiler.time(phase::FUSE, || fuser.fuse(results, config.shared_reference));

        if fused.success_count() == 0 {
            let failures = fused.failed_units();
            error!(units = failures.len(), "every unit failed");
            return Err(OrchestrationError::AllUnitsFailed { failures });
        }
        if fused.is_degraded() {
            warn!(
                failed = fused.failed_units().len(),
                "calibration degraded: some units failed"
            );
        }

        let cache_write_failed = config.cache_enabled
            && !profiler
                .time_async(phase::CACHE_STORE, self.store_fused(config, &fused))
                .await;

        let metrics = profiler.finish(&fused.units, false, cache_write_failed);
        info!(
            total_ms = metrics.total.as_millis() as u64,
            savings_pct = metrics.parallel_savings_pct,
            "calibration run complete"
        );

        Ok(RunReport {
            result: fused,
            metrics,
            plan: Some(Arc::try_unwrap(plan).unwrap_or_else(|shared| (*shared).clone())),
        })
    }

    async fn calibrate_units(
        &self,
        config: &CalibrationConfig,
        plan: &Arc<FrequencyPlan>,
        unit_count: u16,
    ) -> Vec<UnitCalibrationResult> {
        if config.is_parallel() {
            self.calibrate_parallel(config, plan, unit_count).await
        } else {
            self.calibrate_sequential(config, plan, unit_count).await
        }
    }

    /// Units one after another in id order, each on its own task so a
    /// panicking unit fails alone.
    async fn calibrate_sequential(
        &self,
        config: &CalibrationConfig,
        plan: &Arc<FrequencyPlan>,
        unit_count: u16,
    ) -> Vec<UnitCalibrationResult> {
        debug!("calibrating units sequentially");
        let config = Arc::new(config.clone());
        let mut results = Vec::with_capacity(usize::from(unit_count));

        for raw in 0..unit_count {
            let unit_id = UnitId(raw);
            let calibrator = self.calibrator.clone();
            let task_config = Arc::clone(&config);
            let task_plan = Arc::clone(plan);
            // Dropping the set on cancellation aborts the unit.
            let mut task = JoinSet::new();
            task.spawn(
                async move {
                    calibrator
                        .calibrate(unit_id, &task_config, &task_plan)
                        .await
                }
                .in_current_span(),
            );

            let result = match task.join_next().await {
                Some(Ok(result)) => result,
                Some(Err(err)) => {
                    error!(
                        unit = %unit_id,
                        error = %err,
                        "unit calibration task failed to complete"
                    );
                    UnitCalibrationResult::failed(unit_id, PANICKED_UNIT_REASON, Duration::ZERO)
                }
                None => UnitCalibrationResult::failed(unit_id, PANICKED_UNIT_REASON, Duration::ZERO),
            };
            results.push(result);
        }
        results
    }

    /// Cache read off the runtime threads. A failed read task is a miss.
    async fn lookup_cached(&self, config: &CalibrationConfig) -> Option<CacheRecord> {
        let cache = Arc::clone(&self.cache);
        let config = config.clone();
        let span = Span::current();
        match tokio::task::spawn_blocking(move || span.in_scope(|| cache.lookup(&config))).await {
            Ok(cached) => cached,
            Err(err) => {
                warn!(error = %err, "cache lookup task failed; measuring instead");
                None
            }
        }
    }

    /// Cache write off the runtime threads. Returns `false` if nothing was
    /// written.
    async fn store_fused(
        &self,
        config: &CalibrationConfig,
        fused: &FusedCalibrationResult,
    ) -> bool {
        let cache = Arc::clone(&self.cache);
        let config = config.clone();
        let fused = fused.clone();
        let span = Span::current();
        let stored =
            tokio::task::spawn_blocking(move || span.in_scope(|| cache.store(&config, &fused)))
                .await;
        match stored {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                warn!(error = %err, location = %self.cache.location(), "cache write skipped");
                false
            }
            Err(err) => {
                warn!(error = %err, "cache write task failed");
                false
            }
        }
    }

    /// One task per unit. Dropping the returned future drops the
    /// [`JoinSet`], which aborts every task still running.
    async fn calibrate_parallel(
        &self,
        config: &CalibrationConfig,
        plan: &Arc<FrequencyPlan>,
        unit_count: u16,
    ) -> Vec<UnitCalibrationResult> {
        let config = Arc::new(config.clone());
        let arbiter = Arc::new(NoiseSourceArbiter::new(plan.len()));
        let mut tasks = JoinSet::new();

        for raw in 0..unit_count {
            let unit_id = UnitId(raw);
            let start = arbiter.start_offset(unit_id.index(), usize::from(unit_count));
            let calibrator = self.calibrator.clone();
            let config = Arc::clone(&config);
            let plan = Arc::clone(plan);
            let arbiter = Arc::clone(&arbiter);
            tasks.spawn(
                async move {
                    calibrator
                        .calibrate_with(unit_id, &config, &plan, &arbiter, start)
                        .await
                }
                .in_current_span(),
            );
        }

        let mut results = Vec::with_capacity(usize::from(unit_count));
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) => error!(error = %err, "unit calibration task failed to complete"),
            }
        }

        let finished: BTreeSet<UnitId> = results.iter().map(|r| r.unit_id).collect();
        for raw in 0..unit_count {
            let unit_id = UnitId(raw);
            if !finished.contains(&unit_id) {
                results.push(UnitCalibrationResult::failed(
                    unit_id,
                    PANICKED_UNIT_REASON,
                    Duration::ZERO,
                ));
            }
        }
        results
    }
}
