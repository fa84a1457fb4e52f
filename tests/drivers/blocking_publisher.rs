//! Blocking publisher scenarios.

use crate::common::{init_tracing, test_broker, test_config, wait_until, TEST_QUEUE};
use pqdemo::lifecycle::ShutdownLatch;
use pqdemo::publisher::{run_publisher, PublishMode};
use pqdemo::stats::Counters;
use pqdemo::ShutdownReason;
use std::time::Duration;

#[tokio::test]
async fn test_counter_tracks_acknowledgments_exactly() {
    init_tracing();
    let broker = test_broker();
    let counters = Counters::new();
    let latch = ShutdownLatch::new();
    let transport = broker.transport();
    let config = test_config(200);

    let driver = {
        let counters = counters.clone();
        let latch = latch.clone();
        tokio::spawn(async move {
            run_publisher(&transport, &config, PublishMode::Blocking, counters, latch).await
        })
    };

    assert!(wait_until(Duration::from_secs(10), || counters.total() >= 20).await);
    latch.set();
    let report = driver.await.unwrap().unwrap();

    // Every counted message was individually acknowledged, so the queue
    // holds exactly that many.
    assert_eq!(broker.queue_depth(TEST_QUEUE) as u64, report.messages);
    assert_eq!(report.shutdown, ShutdownReason::Operator);
}

#[tokio::test]
async fn test_ack_timeouts_suppress_the_counter_until_recovery() {
    init_tracing();
    let broker = test_broker();
    // Acknowledgments arrive after 3 s while the publisher waits only 2 s.
    broker.set_ack_delay(Some(Duration::from_secs(3)));

    let counters = Counters::new();
    let latch = ShutdownLatch::new();
    let transport = broker.transport();
    let config = test_config(100);

    let driver = {
        let counters = counters.clone();
        let latch = latch.clone();
        tokio::spawn(async move {
            run_publisher(&transport, &config, PublishMode::Blocking, counters, latch).await
        })
    };

    // While timeouts persist nothing is ever counted as sent.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(counters.total(), 0);

    // On recovery the counter resumes.
    broker.set_ack_delay(None);
    assert!(wait_until(Duration::from_secs(15), || counters.total() >= 1).await);

    latch.set();
    let report = driver.await.unwrap().unwrap();
    assert!(report.messages >= 1);
    // Timeouts were logged and ridden out, never escalated.
    assert_eq!(report.shutdown, ShutdownReason::Operator);
}
