//! Publisher drivers: non-blocking with asynchronous acknowledgments, and
//! blocking on each broker acknowledgment.
//!
//! Both variants run the same paced loop: rewrite the payload buffer,
//! generate a `(topic, partition key)` pair, submit, then sleep out the
//! rest of the target interval. They differ only in how acknowledgment is
//! observed: a receipt stream consumed from its own task, versus a
//! bounded wait inside the loop.

use crate::config::Config;
use crate::events::spawn_session_event_logger;
use crate::keygen::KeyTopicGenerator;
use crate::lifecycle::{DriverState, Lifecycle, ShutdownLatch};
use crate::pacer::RatePacer;
use crate::stats::{
    Counters, Direction, RunReport, RunReportBuilder, ShutdownReason, StatsSampler, API_NAME,
};
use anyhow::Context;
use pqdemo_transport::{
    Error as TransportError, MessagePublisher, OutboundMessage, PublishReceipt, PublisherSettings,
    Session, Transport, PARTITION_KEY_PROPERTY,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Every message carries the same fixed-size payload, refilled in place
/// each iteration.
pub const PAYLOAD_SIZE: usize = 256;

/// How long the blocking variant waits for each acknowledgment.
const ACK_WAIT: Duration = Duration::from_millis(2000);

/// Grace given to in-flight acknowledgments at shutdown.
const TERMINATE_GRACE: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Fire-and-forget submits; ACKs and NACKs arrive on the receipt
    /// stream.
    NonBlocking,
    /// Each submit blocks until the broker confirms, times out, or NACKs.
    Blocking,
}

impl PublishMode {
    pub fn sample_name(&self) -> &'static str {
        match self {
            PublishMode::NonBlocking => "NonBlockingPublisher",
            PublishMode::Blocking => "BlockingPublisher",
        }
    }
}

/// Run a publisher until the shutdown latch is set.
pub async fn run_publisher(
    transport: &dyn Transport,
    config: &Config,
    mode: PublishMode,
    counters: Arc<Counters>,
    latch: ShutdownLatch,
) -> anyhow::Result<RunReport> {
    let sample_name = mode.sample_name();
    let mut lifecycle = Lifecycle::new(sample_name);
    let report = RunReportBuilder::start(sample_name);

    lifecycle.advance(DriverState::Connecting);
    let session = transport
        .connect(&config.session)
        .await
        .context("failed to establish broker session")?;
    let event_logger = spawn_session_event_logger(session.subscribe_events());

    let settings = match mode {
        PublishMode::NonBlocking => PublisherSettings::default(),
        PublishMode::Blocking => PublisherSettings {
            back_pressure_slots: 1,
            ack_immediately: true,
        },
    };
    let publisher = session
        .create_publisher(settings)
        .await
        .context("failed to create persistent publisher")?;

    // Taken before the first submit so no receipt can be missed.
    let receipt_logger = match mode {
        PublishMode::NonBlocking => publisher.take_receipts().map(spawn_receipt_logger),
        PublishMode::Blocking => None,
    };

    let sampler = StatsSampler::spawn(sample_name, Direction::Published, counters.clone());

    println!("{API_NAME} {sample_name} connected, and running. Press [ENTER] to quit.");
    println!(
        "Publishing to topic '{}/...', please ensure queue has matching subscription.",
        config.topic_prefix
    );

    let generator =
        KeyTopicGenerator::new(&config.topic_prefix, config.key_policy, config.unique_keys);
    let pacer = RatePacer::new(config.rate);
    let mut payload = [0u8; PAYLOAD_SIZE];
    let mut failure = false;

    lifecycle.advance(DriverState::Running);
    while !latch.is_set() {
        let publish_start = Instant::now();
        let sequence = counters.sequence();
        payload.fill(b'A' + (sequence % 26) as u8);
        let (topic, partition_key) = generator.next(sequence);
        let message = OutboundMessage::new(payload.to_vec())
            .with_property(PARTITION_KEY_PROPERTY, partition_key.clone());

        match mode {
            PublishMode::NonBlocking => match publisher.publish(message, &topic).await {
                Ok(()) => {
                    counters.record_sent();
                    tracing::debug!(
                        order_id = %partition_key,
                        sequence,
                        topic = %topic,
                        "published"
                    );
                }
                Err(e) => {
                    tracing::warn!("### caught while trying to publish: {e}");
                    latch.set();
                    failure = true;
                }
            },
            PublishMode::Blocking => {
                match publisher.publish_await_ack(message, &topic, ACK_WAIT).await {
                    Ok(()) => {
                        // Counted only once the broker has confirmed.
                        counters.record_sent();
                        tracing::info!(
                            order_id = %partition_key,
                            sequence,
                            topic = %topic,
                            "published and acknowledged"
                        );
                    }
                    Err(e @ (TransportError::Nacked(_) | TransportError::AckTimeout(_))) => {
                        tracing::warn!("NACK for message - {e}");
                    }
                    Err(TransportError::Interrupted(reason)) => {
                        tracing::info!(
                            "interrupted while awaiting publish confirm, probably shutting down: {reason}"
                        );
                        latch.set();
                    }
                    Err(e) => {
                        tracing::warn!("### caught while trying to publish: {e}");
                        latch.set();
                        failure = true;
                    }
                }
            }
        }
        pacer.pace(publish_start).await;
    }

    lifecycle.advance(DriverState::Draining);
    sampler.stop();
    if let Err(e) = publisher.terminate(TERMINATE_GRACE).await {
        tracing::warn!("publisher termination reported: {e}");
    }
    if mode == PublishMode::NonBlocking {
        // Trailing acknowledgments are still arriving from the broker.
        tokio::time::sleep(TERMINATE_GRACE).await;
    }
    if let Some(logger) = receipt_logger {
        logger.abort();
    }
    event_logger.abort();
    session
        .disconnect()
        .await
        .context("failed to disconnect session")?;
    lifecycle.advance(DriverState::Closed);
    println!("Main task quitting.");

    let reason = if failure {
        ShutdownReason::Failure
    } else {
        ShutdownReason::Operator
    };
    Ok(report.finish(counters.total(), reason))
}

/// Log publish receipts from a dedicated task: ACKs at debug, NACKs at
/// warn, preferring any user context supplied at submit.
fn spawn_receipt_logger(mut receipts: mpsc::UnboundedReceiver<PublishReceipt>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(receipt) = receipts.recv().await {
            match (&receipt.error, &receipt.user_context) {
                (None, _) => tracing::debug!("ACK for message {}", receipt.message),
                (Some(e), Some(context)) => tracing::warn!("NACK for message {context} - {e}"),
                (Some(e), None) => tracing::warn!("NACK for message {} - {e}", receipt.message),
            }
        }
    })
}
