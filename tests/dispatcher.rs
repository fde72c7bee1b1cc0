mod common;

use common::{Fixture, GatedDetector, ScriptedDetector};
use roadscan::config;
use roadscan::dispatcher::JobDispatcher;
use roadscan::error::ErrorKind;
use roadscan::model::{MediaReference, ReportStatus};
use roadscan::store::ReportRepository;
use std::sync::Arc;
use std::time::Duration;

fn pool(workers: usize, queue_capacity: usize) -> config::Dispatcher {
    config::Dispatcher {
        workers,
        queue_capacity,
    }
}

#[test]
fn background_jobs_complete() {
    let fx = Fixture::new();
    let pipeline = Arc::new(fx.pipeline(Arc::new(ScriptedDetector::new())));
    let dispatcher = JobDispatcher::start(&pool(2, 8), pipeline).unwrap();

    for i in 0..4 {
        let report = fx.submit(
            &format!("r{i}"),
            vec![(MediaReference::image(format!("m{i}")), b"2:0.5".to_vec())],
        );
        dispatcher.launch_background(report).unwrap();
    }
    let stats = dispatcher.shutdown();

    assert_eq!(stats.queued, 4);
    assert_eq!(stats.completed, 4);
    assert_eq!(stats.finished(), 4);
    for i in 0..4 {
        let stored = fx.reports.load(&format!("r{i}")).unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Pending);
        assert_eq!(stored.anomaly_label.as_deref(), Some("D20_Alligator_Crack"));
    }
    assert!(fx.scratch_entries().is_empty());
}

#[test]
fn failed_job_does_not_stop_the_pool() {
    let fx = Fixture::new();
    let pipeline = Arc::new(fx.pipeline(Arc::new(ScriptedDetector::new())));
    let dispatcher = JobDispatcher::start(&pool(1, 4), pipeline).unwrap();

    let mut broken = fx.submit("broken", Vec::new());
    broken.media.push(MediaReference::image("missing"));
    fx.reports.insert(broken.clone()).unwrap();
    let healthy = fx.submit(
        "healthy",
        vec![(MediaReference::image("ok"), b"0:0.9".to_vec())],
    );

    dispatcher.launch_background(broken).unwrap();
    dispatcher.launch_background(healthy).unwrap();
    let stats = dispatcher.shutdown();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(
        fx.reports.load("broken").unwrap().unwrap().status,
        ReportStatus::Error
    );
    assert_eq!(
        fx.reports.load("healthy").unwrap().unwrap().status,
        ReportStatus::Pending
    );
}

#[test]
fn panicking_job_is_contained() {
    let fx = Fixture::new();
    let pipeline = Arc::new(fx.pipeline(Arc::new(ScriptedDetector::new())));
    let dispatcher = JobDispatcher::start(&pool(1, 4), pipeline).unwrap();

    let boom = fx.submit(
        "boom",
        vec![
            (MediaReference::image("fine"), b"1:0.3".to_vec()),
            (MediaReference::image("p"), b"panic".to_vec()),
        ],
    );
    let after = fx.submit("after", vec![(MediaReference::image("q"), b"1:0.3".to_vec())]);
    dispatcher.launch_background(boom).unwrap();
    dispatcher.launch_background(after).unwrap();
    let stats = dispatcher.shutdown();

    assert_eq!(stats.panicked, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(
        fx.reports.load("boom").unwrap().unwrap().status,
        ReportStatus::Error
    );
    assert_eq!(
        fx.reports.load("after").unwrap().unwrap().status,
        ReportStatus::Pending
    );
    assert!(fx.scratch_entries().is_empty(), "{:?}", fx.scratch_entries());
}

#[test]
fn full_queue_is_rejected_without_blocking() {
    let fx = Fixture::new();
    let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::unbounded();
    let detector = Arc::new(GatedDetector::new(entered_tx, release_rx));
    let pipeline = Arc::new(fx.pipeline(detector));
    let dispatcher = JobDispatcher::start(&pool(1, 1), pipeline).unwrap();

    let reports: Vec<_> = (0..3)
        .map(|i| {
            fx.submit(
                &format!("r{i}"),
                vec![(MediaReference::image(format!("m{i}")), b"0:0.4".to_vec())],
            )
        })
        .collect();

    dispatcher.launch_background(reports[0].clone()).unwrap();
    // Worker is now busy inside the detector.
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("worker picked up first job");

    dispatcher.launch_background(reports[1].clone()).unwrap();
    assert_eq!(dispatcher.pending(), 1);
    let err = dispatcher.launch_background(reports[2].clone()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueueFull);
    assert_eq!(
        fx.reports.load("r2").unwrap().unwrap().status,
        ReportStatus::Processing
    );

    drop(release_tx);
    let stats = dispatcher.shutdown();
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.completed, 2);
}

#[test]
fn blocking_launch_waits_for_capacity() {
    let fx = Fixture::new();
    let pipeline = Arc::new(fx.pipeline(Arc::new(
        ScriptedDetector::new().with_delay(Duration::from_millis(20)),
    )));
    let dispatcher = JobDispatcher::start(&pool(1, 1), pipeline).unwrap();

    for i in 0..5 {
        let report = fx.submit(
            &format!("r{i}"),
            vec![(MediaReference::image(format!("m{i}")), b"3:0.6".to_vec())],
        );
        dispatcher.launch_blocking(report).unwrap();
    }
    let stats = dispatcher.shutdown();
    assert_eq!(stats.queued, 5);
    assert_eq!(stats.completed, 5);
}
