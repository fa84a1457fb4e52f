//! Simple consumer scenarios.

use crate::common::{
    init_tracing, seed_messages, test_broker, test_config, wait_until, TEST_QUEUE,
};
use pqdemo::consumer::run_consumer;
use pqdemo::lifecycle::ShutdownLatch;
use pqdemo::stats::Counters;
use pqdemo::ShutdownReason;
use pqdemo_transport_sim::SimBroker;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

fn spawn_consumer(
    broker: &Arc<SimBroker>,
    rate: u32,
) -> (
    Arc<Counters>,
    ShutdownLatch,
    tokio::task::JoinHandle<anyhow::Result<pqdemo::RunReport>>,
) {
    let counters = Counters::new();
    let latch = ShutdownLatch::new();
    let transport = broker.transport();
    let config = test_config(rate);
    let driver = {
        let counters = counters.clone();
        let latch = latch.clone();
        tokio::spawn(async move { run_consumer(&transport, &config, counters, latch).await })
    };
    (counters, latch, driver)
}

#[tokio::test]
async fn test_deliveries_are_acknowledged_after_processing() {
    init_tracing();
    let broker = test_broker();
    seed_messages(&broker, 5, None);
    let (counters, latch, driver) = spawn_consumer(&broker, 500);

    assert!(wait_until(Duration::from_secs(10), || counters.total() == 5).await);
    latch.set();
    let report = assert_ok!(driver.await.unwrap());

    assert_eq!(report.messages, 5);
    assert_eq!(report.shutdown, ShutdownReason::Operator);
    // Everything was acknowledged, so stopping the flow returned nothing.
    assert_eq!(broker.queue_depth(TEST_QUEUE), 0);
}

#[tokio::test]
async fn test_redelivered_flag_sets_the_window_marker() {
    init_tracing();
    let broker = test_broker();
    seed_messages(&broker, 5, Some(2));
    let (counters, latch, driver) = spawn_consumer(&broker, 500);

    assert!(wait_until(Duration::from_secs(10), || counters.total() == 5).await);
    // The marker is sticky until a stats window samples it.
    assert!(counters.take_redelivery());
    assert!(!counters.take_redelivery());

    latch.set();
    driver.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_empty_queue_ticks_without_counting() {
    init_tracing();
    let broker = test_broker();
    let (counters, latch, driver) = spawn_consumer(&broker, 100);

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(counters.total(), 0);

    latch.set();
    let report = driver.await.unwrap().unwrap();
    assert_eq!(report.messages, 0);
    assert_eq!(report.shutdown, ShutdownReason::Operator);
}

#[tokio::test]
async fn test_bind_to_missing_queue_fails_the_driver() {
    init_tracing();
    let broker = SimBroker::new();
    let transport = broker.transport();
    let config = test_config(10);
    let result = run_consumer(
        &transport,
        &config,
        Counters::new(),
        ShutdownLatch::new(),
    )
    .await;

    let error = result.unwrap_err();
    assert!(error.to_string().contains("could not bind"));
}

#[tokio::test]
async fn test_bind_denial_surfaces_not_supported() {
    init_tracing();
    let broker = test_broker();
    broker.set_deny_bind(true);
    let transport = broker.transport();
    let config = test_config(10);
    let result = run_consumer(
        &transport,
        &config,
        Counters::new(),
        ShutdownLatch::new(),
    )
    .await;

    let error = result.unwrap_err();
    assert!(format!("{error:#}").contains("not supported"));
}
