//! Status poller integration tests

use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jobsync::jobs::OutboundMessage;

use super::fixtures::{Harness, MockInventory, MockJob, Probe};

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_sweep_isolates_failing_job() {
    let mut harness = Harness::new();
    harness.register(MockJob::running("j1").shared()).await;
    harness.register(MockJob::running("j2").failing().shared()).await;
    harness.register(MockJob::running("j3").shared()).await;

    let snapshot = harness.session.poller().sweep(false).await;

    assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["j1", "j3"]);

    let messages = harness.drain();
    let errors: Vec<_> = messages
        .iter()
        .filter_map(|m| match m {
            OutboundMessage::JobErr { job_id, message } => Some((job_id.as_str(), message.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "j2");
    assert!(errors[0].1.contains("unreachable"));

    match messages.last() {
        Some(OutboundMessage::JobStatusAll(all)) => assert_eq!(all.len(), 2),
        other => panic!("expected job_status_all, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sweep_respects_refresh_flag() {
    let mut harness = Harness::new();
    harness.register(MockJob::running("j1").shared()).await;
    harness.register(MockJob::running("j2").shared()).await;
    harness.session.registry().set_refresh("j2", false).await.unwrap();

    let snapshot = harness.session.poller().sweep(false).await;
    assert!(snapshot.contains_key("j1"));
    assert!(!snapshot.contains_key("j2"));

    let forced = harness.session.poller().sweep(true).await;
    assert_eq!(forced.len(), 2);

    assert_eq!(harness.drain_types(), vec!["job_status_all", "job_status_all"]);
}

#[tokio::test]
async fn test_empty_registry_still_reports() {
    let mut harness = Harness::new();

    let snapshot = harness.session.poller().sweep(false).await;

    assert!(snapshot.is_empty());
    assert_eq!(harness.drain(), vec![OutboundMessage::JobStatusAll(Default::default())]);
}

#[tokio::test]
async fn test_start_sweeps_immediately_and_stop_halts() {
    let mut harness = Harness::polling(MockInventory::default(), Duration::from_millis(20));
    harness.register(MockJob::running("j1").shared()).await;

    let poller = harness.session.poller().clone();
    assert!(!poller.is_running().await);

    poller.start().await;
    assert!(poller.is_running().await);

    let first = tokio::time::timeout(Duration::from_secs(2), harness.messages.recv())
        .await
        .expect("first sweep")
        .unwrap();
    assert_eq!(first.msg_type(), "job_status_all");

    poller.stop().await;
    assert!(!poller.is_running().await);

    // Let an in-flight sweep finish, then expect silence
    tokio::time::sleep(Duration::from_millis(50)).await;
    harness.drain();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(harness.drain().is_empty());
}

#[tokio::test]
async fn test_restart_never_overlaps_loops() {
    let probe = Arc::new(Probe::default());
    let harness = Harness::polling(MockInventory::default(), Duration::from_millis(1));
    for id in ["j1", "j2"] {
        harness
            .register(
                MockJob::running(id)
                    .with_probe(probe.clone(), Duration::from_millis(10))
                    .shared(),
            )
            .await;
    }

    let poller = harness.session.poller().clone();
    for _ in 0..5 {
        poller.start().await;
        tokio::time::sleep(Duration::from_millis(7)).await;
    }
    poller.stop().await;
    poller.start().await;

    let seen = probe.total();
    wait_for(|| probe.total() >= seen + 4).await;
    poller.stop().await;

    assert_eq!(probe.peak(), 1);
}

#[tokio::test]
async fn test_reinitialize_replaces_loop() {
    let probe = Arc::new(Probe::default());
    let harness = Harness::polling(MockInventory::with_jobs(&["j1", "j2"]), Duration::from_millis(1));
    for id in ["j1", "j2"] {
        harness.factory.provide(
            MockJob::running(id)
                .with_probe(probe.clone(), Duration::from_millis(10))
                .shared(),
        );
    }

    harness.coordinator().initialize("12345").await.unwrap();
    wait_for(|| probe.total() >= 2).await;

    harness.coordinator().initialize("12345").await.unwrap();
    let seen = probe.total();
    wait_for(|| probe.total() >= seen + 4).await;

    assert!(harness.session.poller().is_running().await);
    assert_eq!(harness.session.registry().len().await, 2);
    assert_eq!(probe.peak(), 1);

    harness.session.shutdown().await;
    assert!(!harness.session.poller().is_running().await);
}

#[tokio::test]
async fn test_reinitialize_waits_for_inflight_sweep() {
    let probe = Arc::new(Probe::default());
    let harness = Harness::polling(MockInventory::with_jobs(&["j1"]), Duration::from_secs(10));
    harness
        .register(
            MockJob::running("j1")
                .with_probe(probe.clone(), Duration::from_millis(300))
                .shared(),
        )
        .await;
    harness.factory.observe(probe.clone());

    harness.session.poller().start().await;
    wait_for(|| probe.active() == 1).await;

    harness.coordinator().initialize("12345").await.unwrap();

    assert_eq!(harness.factory.active_at_build(), vec![0]);
    assert_eq!(probe.total(), 1);
    harness.session.shutdown().await;
}

#[tokio::test]
async fn test_restart_request_does_not_wait_for_sweep() {
    let probe = Arc::new(Probe::default());
    let harness = Harness::polling(MockInventory::default(), Duration::from_secs(10));
    harness
        .register(
            MockJob::running("j1")
                .with_probe(probe.clone(), Duration::from_millis(300))
                .shared(),
        )
        .await;

    let poller = harness.session.poller().clone();
    poller.start().await;
    wait_for(|| probe.active() == 1).await;

    let started = Instant::now();
    harness
        .session
        .gateway()
        .handle(&json!({"request_type": "start_update_loop"}))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(150));
    assert!(poller.is_running().await);

    // The replacement loop sweeps once the old sweep is done
    wait_for(|| probe.total() >= 2).await;
    poller.stop().await;
    assert_eq!(probe.peak(), 1);
}

#[tokio::test]
async fn test_sweep_tolerates_removal_midway() {
    let probe = Arc::new(Probe::default());
    let mut harness = Harness::new();
    for id in ["j1", "j2"] {
        harness
            .register(
                MockJob::running(id)
                    .with_probe(probe.clone(), Duration::from_millis(100))
                    .shared(),
            )
            .await;
    }

    let poller = harness.session.poller().clone();
    let sweep = tokio::spawn(async move { poller.sweep(false).await });
    wait_for(|| probe.active() == 1).await;

    let registry = harness.session.registry();
    registry.remove("j1").await.unwrap();
    registry.remove("j2").await.unwrap();

    let snapshot = sweep.await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(probe.total(), 1);

    let types = harness.drain_types();
    assert_eq!(types, vec!["job_status_all"]);
}
