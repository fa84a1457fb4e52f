//! Transacted consumer scenarios.

use crate::common::{
    init_tracing, seed_messages, test_broker, test_config, wait_until, TEST_QUEUE,
};
use pqdemo::consumer::run_transacted_consumer;
use pqdemo::lifecycle::ShutdownLatch;
use pqdemo::stats::Counters;
use pqdemo_transport_sim::SimBroker;
use std::sync::Arc;
use std::time::Duration;

fn spawn_transacted(
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
        tokio::spawn(
            async move { run_transacted_consumer(&transport, &config, counters, latch).await },
        )
    };
    (counters, latch, driver)
}

#[tokio::test]
async fn test_commits_fire_after_each_full_batch() {
    init_tracing();
    let broker = test_broker();
    seed_messages(&broker, 20, None);
    let (counters, latch, driver) = spawn_transacted(&broker, 1000);

    assert!(wait_until(Duration::from_secs(10), || counters.total() == 20).await);
    latch.set();
    let report = driver.await.unwrap().unwrap();

    assert_eq!(report.messages, 20);
    // With a batch size of 8 the commits landed on the 9th and 18th
    // deliveries; the two uncommitted deliveries rolled back when the
    // flow stopped.
    assert_eq!(broker.queue_depth(TEST_QUEUE), 2);
    assert!(broker
        .peek_queue(TEST_QUEUE)
        .iter()
        .all(|message| message.redelivered));
}

#[tokio::test]
async fn test_failed_commit_rolls_back_and_the_next_batch_recommits() {
    init_tracing();
    let broker = test_broker();
    seed_messages(&broker, 20, None);
    broker.set_commit_fail_every(Some(1));
    let (counters, latch, driver) = spawn_transacted(&broker, 100);

    // The first commit fires after the 9th delivery and fails; once the
    // 10th delivery is counted that commit attempt is behind us.
    assert!(wait_until(Duration::from_secs(20), || counters.total() >= 10).await);
    broker.set_commit_fail_every(None);

    // The rolled-back batch of 9 is redelivered: 20 seeded + 9 replayed.
    assert!(wait_until(Duration::from_secs(30), || counters.total() == 29).await);
    latch.set();
    let report = driver.await.unwrap().unwrap();

    assert_eq!(report.messages, 29);
    // Commits succeeded on the 18th and 27th deliveries, leaving two
    // uncommitted deliveries to roll back at stop.
    assert_eq!(broker.queue_depth(TEST_QUEUE), 2);
}

#[tokio::test]
async fn test_redelivered_batch_sets_the_window_marker() {
    init_tracing();
    let broker = test_broker();
    seed_messages(&broker, 12, None);
    broker.set_commit_fail_every(Some(1));
    let (counters, latch, driver) = spawn_transacted(&broker, 200);

    assert!(wait_until(Duration::from_secs(20), || counters.total() >= 10).await);
    broker.set_commit_fail_every(None);
    // Redelivered messages from the rollback carry the broker flag.
    assert!(wait_until(Duration::from_secs(20), || counters.total() >= 11).await);
    assert!(counters.take_redelivery());

    latch.set();
    driver.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bind_denial_surfaces_not_supported() {
    init_tracing();
    let broker = SimBroker::new();
    broker.provision_queue(TEST_QUEUE, None);
    broker.set_deny_bind(true);
    let transport = broker.transport();
    let config = test_config(10);

    let result = run_transacted_consumer(
        &transport,
        &config,
        Counters::new(),
        ShutdownLatch::new(),
    )
    .await;
    assert!(result.is_err());
}
