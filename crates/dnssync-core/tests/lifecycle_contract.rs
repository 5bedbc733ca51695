//! Contract Test: Engine Lifecycle
//!
//! Constraints verified:
//! - An existing registration is not fatal
//! - Registration failures and unknown domains stop the engine before any cycle
//! - The first cycle runs immediately after startup
//! - Shutdown deregisters, even while a cycle is blocked on propagation
//! - Shutdown removes a cache-busting record an interrupted cycle left behind
//!
//! If this test fails, someone has added:
//! - Blocking work in the shutdown path
//! - Cycles that ignore cancellation
//! - Startup paths that swallow fatal errors

mod common;

use common::*;
use dnssync_core::records::HostRecord;
use dnssync_core::{Error, SyncEngine, SyncEvent};
use std::sync::Arc;
use tokio::time::{Duration, sleep, timeout};

fn engine(
    orchestrator: &Arc<MockOrchestrator>,
    registrar: &Arc<MockRegistrar>,
    resolver: Arc<LaggingResolver>,
    config: dnssync_core::SyncConfig,
) -> (SyncEngine, tokio::sync::mpsc::Receiver<SyncEvent>) {
    SyncEngine::new(orchestrator.clone(), registrar.clone(), resolver, config)
        .expect("engine construction succeeds")
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let orchestrator = Arc::new(MockOrchestrator::new(vec![]));
    let registrar = Arc::new(MockRegistrar::new(vec![]));
    let resolver = Arc::new(LaggingResolver::new(Arc::clone(&registrar), 0));

    let mut config = fast_config();
    config.poll_interval_secs = 0;

    let result = SyncEngine::new(orchestrator, registrar, resolver, config);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn already_registered_is_not_fatal() {
    let orchestrator = Arc::new(
        MockOrchestrator::new(vec![]).with_registration(Registration::AlreadyRegistered),
    );
    let registrar = Arc::new(MockRegistrar::new(vec![]));
    let resolver = Arc::new(LaggingResolver::new(Arc::clone(&registrar), 0));
    let (engine, mut events) = engine(&orchestrator, &registrar, resolver, fast_config());

    let info = engine.startup().await.expect("startup succeeds");

    assert_eq!(info.name, DOMAIN);
    assert_eq!(
        events.try_recv().unwrap(),
        SyncEvent::Registered {
            kind: dnssync_core::ProviderKind::Dns,
            already: true
        }
    );
}

#[tokio::test]
async fn registration_failure_is_fatal() {
    let orchestrator =
        Arc::new(MockOrchestrator::new(vec![]).with_registration(Registration::Reject));
    let registrar = Arc::new(MockRegistrar::new(vec![]));
    let resolver = Arc::new(LaggingResolver::new(Arc::clone(&registrar), 0));
    let (engine, _events) = engine(&orchestrator, &registrar, resolver, fast_config());

    let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let result = engine.run_with_shutdown(Some(shutdown_rx)).await;

    assert!(matches!(result, Err(Error::Startup(_))));
    assert_eq!(orchestrator.get_call_count(), 0, "no cycle may run");
}

#[tokio::test]
async fn unknown_domain_is_fatal() {
    let orchestrator = Arc::new(MockOrchestrator::new(vec![]));
    let registrar = Arc::new(MockRegistrar::new(vec![]).without_domain());
    let resolver = Arc::new(LaggingResolver::new(Arc::clone(&registrar), 0));
    let (engine, _events) = engine(&orchestrator, &registrar, resolver, fast_config());

    let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let result = engine.run_with_shutdown(Some(shutdown_rx)).await;

    match result {
        Err(Error::Startup(msg)) => assert!(msg.contains("not found at registrar"), "{}", msg),
        other => panic!("expected a startup error, got {:?}", other),
    }
    assert_eq!(orchestrator.register_call_count(), 1);
    assert_eq!(orchestrator.get_call_count(), 0);
    assert_eq!(registrar.write_count(), 0);
}

#[tokio::test]
async fn first_cycle_runs_immediately_and_shutdown_deregisters() {
    let orchestrator = Arc::new(MockOrchestrator::new(vec![dns_resource(
        "r1", "@", "A", "1.2.3.4", 1800,
    )]));
    let registrar = Arc::new(MockRegistrar::new(vec![HostRecord::new("@", "A", "1.2.3.4", 1800)]));
    let resolver = Arc::new(LaggingResolver::new(Arc::clone(&registrar), 0));
    let (engine, _events) = engine(&orchestrator, &registrar, resolver, fast_config());

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    sleep(Duration::from_millis(100)).await;

    // 30s poll interval: exactly one cycle so far
    assert_eq!(orchestrator.get_call_count(), 1);
    assert_eq!(orchestrator.statuses().len(), 1);

    shutdown_tx.send(()).unwrap();
    let result = timeout(Duration::from_secs(5), engine_handle).await;
    assert!(result.is_ok(), "Engine should terminate within 5 seconds");
    result.unwrap().unwrap().expect("clean shutdown");

    assert_eq!(orchestrator.deregister_call_count(), 1);
    assert_eq!(registrar.write_count(), 0, "nothing to clean up after a finished cycle");
}

#[tokio::test]
async fn failed_cycles_do_not_stop_the_loop() {
    let orchestrator = Arc::new(MockOrchestrator::new(vec![]));
    orchestrator.fail_fetches();
    let registrar = Arc::new(MockRegistrar::new(vec![]));
    let resolver = Arc::new(LaggingResolver::new(Arc::clone(&registrar), 0));

    let mut config = fast_config();
    config.poll_interval_secs = 1;
    let (engine, mut events) = engine(&orchestrator, &registrar, resolver, config);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    sleep(Duration::from_millis(1500)).await;
    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().expect("clean shutdown");

    assert_eq!(orchestrator.get_call_count(), 2, "second cycle after one interval");
    assert_eq!(registrar.write_count(), 0);

    let mut failed = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SyncEvent::CycleFailed { .. }) {
            failed += 1;
        }
    }
    assert_eq!(failed, 2);
}

#[tokio::test]
async fn shutdown_interrupts_propagation_wait() {
    let orchestrator = Arc::new(MockOrchestrator::new(vec![dns_resource(
        "r1", "@", "A", "1.2.3.4", 1800,
    )]));
    let registrar = Arc::new(MockRegistrar::new(vec![]));
    let resolver = Arc::new(LaggingResolver::never(Arc::clone(&registrar)));

    // Default: wait for propagation without bound
    let mut config = fast_config();
    config.verify.delay_secs = 1;
    config.verify.max_delay_secs = 1;
    let (engine, _events) = engine(&orchestrator, &registrar, resolver, config);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    sleep(Duration::from_millis(100)).await;
    assert!(registrar.write_count() >= 2, "clean write plus a cache-busting write");

    shutdown_tx.send(()).unwrap();
    let result = timeout(Duration::from_secs(5), engine_handle).await;
    assert!(result.is_ok(), "Shutdown must not wait for propagation");
    result.unwrap().unwrap().expect("clean shutdown");

    assert_eq!(orchestrator.deregister_call_count(), 1);
    assert!(orchestrator.statuses().is_empty(), "unverified records are never reported");

    let desired = vec![HostRecord::new("@", "A", "1.2.3.4", 1800)];
    assert_eq!(registrar.hosts(), desired, "cache-busting record removed on shutdown");
    assert!(!registrar.hosts().iter().any(|h| h.record_type == "TXT"));
    assert_eq!(registrar.writes().last(), Some(&desired));
}

#[tokio::test]
async fn failed_shutdown_cleanup_still_deregisters() {
    let orchestrator = Arc::new(MockOrchestrator::new(vec![dns_resource(
        "r1", "@", "A", "1.2.3.4", 1800,
    )]));
    let registrar = Arc::new(MockRegistrar::new(vec![]));
    let resolver = Arc::new(LaggingResolver::never(Arc::clone(&registrar)));

    let mut config = fast_config();
    config.verify.delay_secs = 1;
    config.verify.max_delay_secs = 1;
    let (engine, _events) = engine(&orchestrator, &registrar, resolver, config);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    sleep(Duration::from_millis(100)).await;
    // Clean write and cache-busting write accepted, the cleanup is not
    registrar.fail_sets_after(2);

    shutdown_tx.send(()).unwrap();
    let result = timeout(Duration::from_secs(5), engine_handle).await;
    assert!(result.is_ok(), "A failed cleanup must not block shutdown");
    result.unwrap().unwrap().expect("clean shutdown");

    assert_eq!(registrar.write_count(), 3);
    assert_eq!(orchestrator.deregister_call_count(), 1);
}
