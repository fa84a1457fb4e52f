//! Consumer drivers: simple flow-receive with per-message acknowledgment,
//! and transacted flow-receive committing fixed-size batches.
//!
//! Both pull from a bound queue flow under the rate pacer with a short
//! receive timeout, so an idle queue still ticks the loop and the stats
//! window. Acknowledgment always follows processing, never precedes it.

use crate::config::Config;
use crate::events::spawn_session_event_logger;
use crate::lifecycle::{DriverState, Lifecycle, ShutdownLatch};
use crate::pacer::RatePacer;
use crate::stats::{
    Counters, Direction, RunReport, RunReportBuilder, ShutdownReason, WindowReporter, API_NAME,
};
use anyhow::Context;
use pqdemo_transport::{
    AccessType, AckMode, Error as TransportError, FlowSettings, InboundMessage, QueueFlow, Session,
    TransactedFlow, Transport,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Blocking receive timeout; an empty tick is not an error.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(200);

/// Pause between stopping the flow and closing the session.
const STOP_SETTLE: Duration = Duration::from_secs(1);

fn note_delivery(message: &InboundMessage, counters: &Counters) {
    counters.record_received();
    if message.redelivered() {
        // The broker delivered this before without seeing an ACK; the
        // marker stays up until the next stats window reports it.
        counters.mark_redelivery();
    }
}

/// Run the simple consumer until the shutdown latch is set.
pub async fn run_consumer(
    transport: &dyn Transport,
    config: &Config,
    counters: Arc<Counters>,
    latch: ShutdownLatch,
) -> anyhow::Result<RunReport> {
    let sample_name = "QueueConsumer";
    let mut lifecycle = Lifecycle::new(sample_name);
    let report = RunReportBuilder::start(sample_name);

    lifecycle.advance(DriverState::Connecting);
    let session = transport
        .connect(&config.session)
        .await
        .context("failed to establish broker session")?;
    let event_logger = spawn_session_event_logger(session.subscribe_events());

    println!(
        "Attempting to bind to queue '{}' on the broker.",
        config.queue_name
    );
    let settings = FlowSettings::new(&config.queue_name)
        .with_ack_mode(AckMode::Client)
        .with_transport_window(config.transport_window);
    let mut flow = match session.bind_queue(settings).await {
        Ok(flow) => flow,
        Err(e) => return Err(bind_failure(&config.queue_name, e)),
    };

    println!("{API_NAME} {sample_name} connected, and running. Press [ENTER] to quit.");
    tracing::info!(
        vpn = %config.vpn_name,
        queue = %config.queue_name,
        "ready to read messages from broker"
    );

    let pacer = RatePacer::new(config.rate);
    let mut reporter = WindowReporter::new(sample_name, Direction::Received);
    let mut failure = false;

    lifecycle.advance(DriverState::Running);
    while !latch.is_set() {
        let receive_start = Instant::now();
        match flow.receive(RECEIVE_TIMEOUT).await {
            Ok(Some(message)) => {
                note_delivery(&message, &counters);
                // All processing of the delivery happens before this point.
                message.ack();
            }
            Ok(None) => {}
            Err(e) if e.is_fatal() => {
                tracing::error!("queue flow failed: {e}");
                latch.set();
                failure = true;
            }
            Err(e) => tracing::warn!("receive error: {e}"),
        }
        pacer.pace(receive_start).await;
        reporter.maybe_report(&counters);
    }

    lifecycle.advance(DriverState::Draining);
    if let Err(e) = flow.stop().await {
        tracing::warn!("flow stop reported: {e}");
    }
    tokio::time::sleep(STOP_SETTLE).await;
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

/// Run the transacted consumer until the shutdown latch is set.
///
/// Deliveries accumulate into a broker transaction; once the count passes
/// the configured batch size the transaction commits, acknowledging the
/// whole batch atomically. A failed commit is rolled back broker-side and
/// the batch comes back redelivered; the driver logs and keeps going.
pub async fn run_transacted_consumer(
    transport: &dyn Transport,
    config: &Config,
    counters: Arc<Counters>,
    latch: ShutdownLatch,
) -> anyhow::Result<RunReport> {
    let sample_name = "TransactedConsumer";
    let mut lifecycle = Lifecycle::new(sample_name);
    let report = RunReportBuilder::start(sample_name);

    lifecycle.advance(DriverState::Connecting);
    let session = transport
        .connect(&config.session)
        .await
        .context("failed to establish broker session")?;
    let event_logger = spawn_session_event_logger(session.subscribe_events());

    println!(
        "Attempting to bind to queue '{}' on the broker.",
        config.queue_name
    );
    // Non-exclusive so several consumers can cooperate on the same
    // partitioned queue.
    let settings = FlowSettings::new(&config.queue_name)
        .with_ack_mode(AckMode::Client)
        .with_transport_window(config.transport_window)
        .with_access_type(AccessType::NonExclusive);
    let mut flow = match session.bind_transacted(settings).await {
        Ok(flow) => flow,
        Err(e) => return Err(bind_failure(&config.queue_name, e)),
    };

    println!("{API_NAME} {sample_name} connected, and running. Press [ENTER] to quit.");
    tracing::info!(
        vpn = %config.vpn_name,
        queue = %config.queue_name,
        batch = config.transacted_batch,
        "ready to read messages from broker"
    );

    let pacer = RatePacer::new(config.rate);
    let mut reporter = WindowReporter::new(sample_name, Direction::Received);
    let mut tx_count: u32 = 0;
    let mut failure = false;

    lifecycle.advance(DriverState::Running);
    while !latch.is_set() {
        let receive_start = Instant::now();
        match flow.receive(RECEIVE_TIMEOUT).await {
            Ok(Some(message)) => {
                note_delivery(&message, &counters);
                tx_count += 1;
                if tx_count > config.transacted_batch {
                    match flow.commit().await {
                        Ok(()) => tx_count = 0,
                        Err(e) => {
                            // Never advance silently past a failed commit:
                            // the broker rolled the batch back and will
                            // redeliver it.
                            tracing::warn!("transaction commit failed: {e}");
                            tx_count = 0;
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(e) if e.is_fatal() => {
                tracing::error!("queue flow failed: {e}");
                latch.set();
                failure = true;
            }
            Err(e) => tracing::warn!("receive error: {e}"),
        }
        pacer.pace(receive_start).await;
        reporter.maybe_report(&counters);
    }

    lifecycle.advance(DriverState::Draining);
    if let Err(e) = flow.stop().await {
        tracing::warn!("flow stop reported: {e}");
    }
    tokio::time::sleep(STOP_SETTLE).await;
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

fn bind_failure(queue_name: &str, error: TransportError) -> anyhow::Error {
    if !matches!(error, TransportError::BindNotSupported(_)) {
        eprintln!("*** Could not establish a connection to queue '{queue_name}': {error}");
        eprintln!("Exiting.");
    }
    anyhow::Error::new(error).context(format!("could not bind to queue '{queue_name}'"))
}
