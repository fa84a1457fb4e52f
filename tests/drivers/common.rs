//! Shared fixtures for the driver scenario tests.

use pqdemo::config::Config;
use pqdemo::keygen::KeyPolicy;
use pqdemo_transport::{OutboundMessage, SessionConfig, PARTITION_KEY_PROPERTY};
use pqdemo_transport_sim::SimBroker;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const TEST_QUEUE: &str = "partitioned-queue-1";

pub fn test_config(rate: u32) -> Config {
    Config {
        rate,
        queue_name: TEST_QUEUE.to_string(),
        vpn_name: "default".to_string(),
        key_policy: KeyPolicy::RotatingOrder,
        unique_keys: 20,
        transacted_batch: 8,
        topic_prefix: "pqdemo".to_string(),
        transport_window: 10,
        session: SessionConfig::default(),
    }
}

/// Broker with the test queue provisioned and subscribed to the topic root.
pub fn test_broker() -> Arc<SimBroker> {
    let broker = SimBroker::new();
    broker.provision_queue(TEST_QUEUE, Some("pqdemo"));
    broker
}

pub fn seed_messages(broker: &SimBroker, count: usize, redelivered_index: Option<usize>) {
    for i in 0..count {
        let message = OutboundMessage::new(vec![b'A' + (i % 26) as u8; 256])
            .with_property(PARTITION_KEY_PROPERTY, format!("{:05}", i % 4 + 1));
        broker.seed_queue(TEST_QUEUE, message, redelivered_index == Some(i));
    }
}

/// Poll `condition` until it holds or `deadline` passes.
pub async fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("pqdemo=info,pqdemo_transport_sim=debug")
        .try_init()
        .ok();
}
