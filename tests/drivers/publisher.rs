//! Non-blocking publisher scenarios.

use crate::common::{init_tracing, test_broker, test_config, wait_until, TEST_QUEUE};
use pqdemo::lifecycle::ShutdownLatch;
use pqdemo::publisher::{run_publisher, PublishMode, PAYLOAD_SIZE};
use pqdemo::stats::Counters;
use pqdemo::ShutdownReason;
use pqdemo_transport::PARTITION_KEY_PROPERTY;
use pqdemo_transport_sim::SimBroker;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn spawn_publisher(
    broker: &Arc<SimBroker>,
    rate: u32,
    mode: PublishMode,
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
        tokio::spawn(async move { run_publisher(&transport, &config, mode, counters, latch).await })
    };
    (counters, latch, driver)
}

#[tokio::test]
async fn test_fire_and_forget_run_acknowledges_everything() {
    init_tracing();
    let broker = test_broker();
    let (counters, latch, driver) = spawn_publisher(&broker, 500, PublishMode::NonBlocking);

    assert!(wait_until(Duration::from_secs(10), || counters.total() >= 100).await);
    latch.set();
    let report = driver.await.unwrap().unwrap();

    assert!(report.messages >= 100);
    assert_eq!(report.shutdown, ShutdownReason::Operator);
    // No NACK schedule: every submission was routed and acknowledged.
    assert_eq!(broker.queue_depth(TEST_QUEUE) as u64, report.messages);
}

#[tokio::test]
async fn test_published_messages_carry_one_partition_key() {
    init_tracing();
    let broker = test_broker();
    let (counters, latch, driver) = spawn_publisher(&broker, 500, PublishMode::NonBlocking);

    assert!(wait_until(Duration::from_secs(10), || counters.total() >= 30).await);
    latch.set();
    driver.await.unwrap().unwrap();

    let queued = broker.peek_queue(TEST_QUEUE);
    assert!(!queued.is_empty());
    for message in &queued {
        assert_eq!(message.properties.len(), 1);
        let key = message.properties.get(PARTITION_KEY_PROPERTY).unwrap();
        assert!(!key.is_empty());
        assert_eq!(key.len(), 5);
        assert!(key.chars().all(|c| c.is_ascii_digit()));

        assert_eq!(message.payload.len(), PAYLOAD_SIZE);
        let first = message.payload[0];
        assert!(first.is_ascii_uppercase());
        assert!(message.payload.iter().all(|b| *b == first));
    }
}

#[tokio::test]
async fn test_nacks_are_transient_and_the_loop_continues() {
    init_tracing();
    let broker = test_broker();
    broker.set_nack_every(Some(7));
    let (counters, latch, driver) = spawn_publisher(&broker, 500, PublishMode::NonBlocking);

    assert!(wait_until(Duration::from_secs(10), || counters.total() >= 100).await);
    latch.set();
    let report = driver.await.unwrap().unwrap();

    // The sent counter advances for NACKed submissions too, and the loop
    // never exits over them.
    assert!(report.messages >= 100);
    assert_eq!(report.shutdown, ShutdownReason::Operator);
    let nacked = report.messages / 7;
    assert_eq!(broker.queue_depth(TEST_QUEUE) as u64, report.messages - nacked);
}

#[tokio::test]
async fn test_observed_rate_tracks_the_target() {
    init_tracing();
    let broker = test_broker();
    let (counters, latch, driver) = spawn_publisher(&broker, 50, PublishMode::NonBlocking);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let observed = counters.total();
    latch.set();
    driver.await.unwrap().unwrap();

    // 50 msgs/s over ~2 s; generous bounds since pacing is averaging,
    // not hard scheduling.
    assert!(observed >= 60, "observed only {observed} messages");
    assert!(observed <= 115, "observed {observed} messages");
}

#[tokio::test]
async fn test_service_interruption_is_log_only() {
    init_tracing();
    let broker = test_broker();
    let (counters, latch, driver) = spawn_publisher(&broker, 500, PublishMode::NonBlocking);

    assert!(wait_until(Duration::from_secs(10), || counters.total() >= 10).await);
    broker.emit_event(pqdemo_transport::SessionEvent::ServiceInterrupted {
        reason: "link down".to_string(),
    });

    // The interruption is logged; publishing carries on regardless.
    let before = counters.total();
    assert!(wait_until(Duration::from_secs(10), || counters.total() >= before + 10).await);

    latch.set();
    let report = driver.await.unwrap().unwrap();
    assert_eq!(report.shutdown, ShutdownReason::Operator);
}

#[tokio::test]
async fn test_graceful_shutdown_honors_the_drain_grace() {
    init_tracing();
    let broker = test_broker();
    let (counters, latch, driver) = spawn_publisher(&broker, 200, PublishMode::NonBlocking);

    assert!(wait_until(Duration::from_secs(10), || counters.total() >= 50).await);
    let stop_requested = Instant::now();
    latch.set();

    let report = tokio::time::timeout(Duration::from_secs(6), driver)
        .await
        .expect("driver must finish draining within the grace windows")
        .unwrap()
        .unwrap();

    // Terminate grace (1.5 s) plus the acknowledgment drain (1.5 s), with
    // slack for the final paced iteration.
    assert!(stop_requested.elapsed() >= Duration::from_millis(1500));
    assert!(stop_requested.elapsed() < Duration::from_secs(5));
    assert_eq!(report.shutdown, ShutdownReason::Operator);
}
