//! Periodic background recalibration.
//!
//! [`RecalibrationTask`] re-runs the orchestrator on a fixed interval and
//! publishes every outcome on one broadcast channel. Subscribers get a
//! [`RecalibrationStream`]; the most recent successful report is also kept
//! for polling through [`RecalibrationTask::latest`].

use std::sync::Arc;
use std::time::Duration;

use dualcal_core::config::CalibrationConfig;
use dualcal_core::domain::RunReport;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::orchestrator::{CalibrationOrchestrator, RunOptions};

/// Capacity of the outcome channel; slower subscribers lag.
const EVENT_CAPACITY: usize = 16;

/// Shortest accepted interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// One published outcome.
#[derive(Debug, Clone)]
pub enum RecalibrationEvent {
    /// Run `iteration` (1-based) succeeded.
    Completed {
        iteration: u64,
        report: Arc<RunReport>,
    },
    /// Run `iteration` failed.
    Failed { iteration: u64, error: String },
}

impl RecalibrationEvent {
    /// 1-based index of the run this event reports.
    #[must_use]
    pub fn iteration(&self) -> u64 {
        match self {
            Self::Completed { iteration, .. } | Self::Failed { iteration, .. } => *iteration,
        }
    }
}

/// Receiving side of a task's outcome channel.
pub struct RecalibrationStream {
    receiver: broadcast::Receiver<RecalibrationEvent>,
}

impl RecalibrationStream {
    /// Next outcome, or `None` once the task has ended and every
    /// published outcome has been received.
    pub async fn next(&mut self) -> Option<RecalibrationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "recalibration subscriber lagged");
                }
            }
        }
    }
}

/// Handle to a running periodic recalibration.
///
/// Dropping the handle aborts the task; [`RecalibrationTask::stop`] shuts it
/// down and waits for it. A run cut short by either never reaches the
/// cache.
pub struct RecalibrationTask {
    events: broadcast::Receiver<RecalibrationEvent>,
    /// Receiver created with the channel; handed to the first subscriber.
    first: Mutex<Option<broadcast::Receiver<RecalibrationEvent>>>,
    latest: Arc<RwLock<Option<Arc<RunReport>>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RecalibrationTask {
    /// Run `orchestrator.run(&config)` now and then every `interval`.
    #[must_use]
    pub fn spawn(
        orchestrator: Arc<CalibrationOrchestrator>,
        config: CalibrationConfig,
        interval: Duration,
    ) -> Self {
        Self::spawn_with_options(orchestrator, config, RunOptions::default(), interval)
    }

    /// Like [`RecalibrationTask::spawn`] with explicit run options.
    #[must_use]
    pub fn spawn_with_options(
        orchestrator: Arc<CalibrationOrchestrator>,
        config: CalibrationConfig,
        options: RunOptions,
        interval: Duration,
    ) -> Self {
        let (events_tx, first) = broadcast::channel(EVENT_CAPACITY);
        let events = first.resubscribe();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let latest = Arc::new(RwLock::new(None));

        let handle = tokio::spawn(run_loop(
            orchestrator,
            config,
            options,
            interval.max(MIN_INTERVAL),
            events_tx,
            Arc::clone(&latest),
            shutdown_rx,
        ));

        Self {
            events,
            first: Mutex::new(Some(first)),
            latest,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Subscribe to published outcomes.
    ///
    /// The first subscriber sees every outcome since the task was spawned;
    /// later subscribers see outcomes published after they subscribed.
    #[must_use]
    pub fn subscribe(&self) -> RecalibrationStream {
        let receiver = self
            .first
            .lock()
            .take()
            .unwrap_or_else(|| self.events.resubscribe());
        RecalibrationStream { receiver }
    }

    /// Most recent successful report.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<RunReport>> {
        self.latest.read().clone()
    }

    /// `true` once the background task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal shutdown and wait for the task to end. An in-flight run is
    /// cancelled.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "recalibration task ended abnormally");
                }
            }
        }
    }
}

impl Drop for RecalibrationTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run_loop(
    orchestrator: Arc<CalibrationOrchestrator>,
    config: CalibrationConfig,
    options: RunOptions,
    interval: Duration,
    events: broadcast::Sender<RecalibrationEvent>,
    latest: Arc<RwLock<Option<Arc<RunReport>>>>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut iteration: u64 = 0;
    debug!(interval_ms = interval.as_millis() as u64, "recalibration loop started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {}
        }

        iteration += 1;
        let outcome = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                info!(iteration, "recalibration stopped during a run");
                break;
            }
            outcome = orchestrator.run_with_options(&config, &options) => outcome,
        };

        let event = match outcome {
            Ok(report) => {
                let report = Arc::new(report);
                *latest.write() = Some(Arc::clone(&report));
                info!(iteration, cache_hit = report.metrics.cache_hit, "recalibration complete");
                RecalibrationEvent::Completed { iteration, report }
            }
            Err(err) => {
                warn!(iteration, error = %err, "recalibration failed");
                RecalibrationEvent::Failed {
                    iteration,
                    error: err.to_string(),
                }
            }
        };
        let _ = events.send(event);
    }
    debug!(iterations = iteration, "recalibration loop ended");
}
