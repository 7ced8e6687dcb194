//! Periodic recalibration: publication, cancellation and shutdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{two_unit_config, TablePort};
use dualcal_core::config::CalibrationConfig;
use dualcal_core::domain::UnitId;
use dualcal_engine::{
    CacheLookup, CalibrationCache, CalibrationOrchestrator, RecalibrationEvent, RecalibrationTask,
    RunOptions,
};

fn orchestrator(port: Arc<TablePort>) -> Arc<CalibrationOrchestrator> {
    Arc::new(CalibrationOrchestrator::new(
        port,
        Arc::new(CalibrationCache::in_memory()),
    ))
}

#[tokio::test(start_paused = true)]
async fn publishes_one_event_per_interval() {
    let port = Arc::new(TablePort::new(4));
    let task = RecalibrationTask::spawn(
        orchestrator(Arc::clone(&port)),
        two_unit_config(),
        Duration::from_secs(60),
    );
    let mut events = task.subscribe();

    let mut iterations = Vec::new();
    let mut cache_hits = Vec::new();
    for _ in 0..3 {
        match events.next().await.expect("event") {
            RecalibrationEvent::Completed { iteration, report } => {
                iterations.push(iteration);
                cache_hits.push(report.metrics.cache_hit);
            }
            RecalibrationEvent::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }

    assert_eq!(iterations, vec![1, 2, 3]);
    // Later runs fall inside the default TTL.
    assert_eq!(cache_hits, vec![false, true, true]);
    assert_eq!(port.calls(), 62);

    let latest = task.latest().expect("latest report");
    assert!(latest.metrics.cache_hit);
    task.stop().await;
}

#[tokio::test(start_paused = true)]
async fn skipping_lookup_measures_every_time() {
    let port = Arc::new(TablePort::new(4));
    let options = RunOptions {
        skip_cache_lookup: true,
        ..RunOptions::default()
    };
    let task = RecalibrationTask::spawn_with_options(
        orchestrator(Arc::clone(&port)),
        two_unit_config(),
        options,
        Duration::from_secs(60),
    );
    let mut events = task.subscribe();

    for expected in 1..=2 {
        let event = events.next().await.expect("event");
        assert_eq!(event.iteration(), expected);
        assert!(matches!(event, RecalibrationEvent::Completed { .. }));
    }
    assert_eq!(port.calls(), 124);
    task.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_runs_are_published_and_do_not_replace_latest() {
    let port = Arc::new(TablePort::new(4).failing_unit(UnitId(0)).failing_unit(UnitId(1)));
    let task =
        RecalibrationTask::spawn(orchestrator(port), two_unit_config(), Duration::from_secs(1));
    let mut events = task.subscribe();

    match events.next().await.expect("event") {
        RecalibrationEvent::Failed { iteration, error } => {
            assert_eq!(iteration, 1);
            assert!(error.contains("all 2 units failed"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(task.latest().is_none());
    task.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_a_run_in_flight() {
    let port = Arc::new(TablePort::new(4).with_delay(Duration::from_secs(1)));
    let orch = orchestrator(Arc::clone(&port));
    let config = CalibrationConfig {
        dwell_ms: 2000,
        ..two_unit_config()
    };
    let task =
        RecalibrationTask::spawn(Arc::clone(&orch), config.clone(), Duration::from_secs(600));
    let mut events = task.subscribe();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(port.calls() > 0);
    task.stop().await;

    assert!(events.next().await.is_none());
    assert_eq!(orch.cache().inspect(&config), CacheLookup::Absent);

    let calls = port.calls();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(port.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn stream_ends_after_stop() {
    let task = RecalibrationTask::spawn(
        orchestrator(Arc::new(TablePort::new(4))),
        two_unit_config(),
        Duration::from_secs(60),
    );
    let mut events = task.subscribe();

    assert!(events.next().await.is_some());
    assert!(!task.is_finished());
    task.stop().await;
    assert!(events.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_aborts_the_loop() {
    let port = Arc::new(TablePort::new(4).with_delay(Duration::from_secs(1)));
    let config = CalibrationConfig {
        dwell_ms: 2000,
        ..two_unit_config()
    };
    let task = RecalibrationTask::spawn(
        orchestrator(Arc::clone(&port)),
        config,
        Duration::from_secs(600),
    );
    let mut events = task.subscribe();

    tokio::time::sleep(Duration::from_secs(2)).await;
    drop(task);

    assert!(events.next().await.is_none());
    let calls = port.calls();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(port.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn first_subscriber_sees_runs_published_before_subscribing() {
    let task = RecalibrationTask::spawn(
        orchestrator(Arc::new(TablePort::new(4))),
        two_unit_config(),
        Duration::from_secs(60),
    );
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(task.latest().is_some());

    let mut first = task.subscribe();
    let mut second = task.subscribe();

    assert_eq!(first.next().await.map(|e| e.iteration()), Some(1));
    assert_eq!(second.next().await.map(|e| e.iteration()), Some(2));
    task.stop().await;
}
