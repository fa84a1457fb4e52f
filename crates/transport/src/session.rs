//! The transport capability traits.

use crate::error::Result;
use crate::event::SessionEvent;
use crate::message::{InboundMessage, OutboundMessage, PublishReceipt};
use crate::settings::{FlowSettings, PublisherSettings, SessionConfig};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Entry point: something that can establish broker sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, config: &SessionConfig) -> Result<Box<dyn Session>>;
}

/// An established broker session.
#[async_trait]
pub trait Session: Send + Sync {
    /// Create and start a persistent message publisher.
    async fn create_publisher(
        &self,
        settings: PublisherSettings,
    ) -> Result<Box<dyn MessagePublisher>>;

    /// Bind a flow to a named queue for plain (per-message acknowledged)
    /// consumption.
    async fn bind_queue(&self, settings: FlowSettings) -> Result<Box<dyn QueueFlow>>;

    /// Bind a flow to a named queue on a transacted session: deliveries
    /// accumulate into a transaction that [`TransactedFlow::commit`]
    /// acknowledges atomically.
    async fn bind_transacted(&self, settings: FlowSettings) -> Result<Box<dyn TransactedFlow>>;

    /// Subscribe to session lifecycle and flow events. Every subscriber
    /// sees every event emitted after it subscribes.
    fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent>;

    /// Tear the session down. Flows and publishers created from it become
    /// unusable.
    async fn disconnect(&self) -> Result<()>;
}

/// A started persistent publisher.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Submit a message to a topic. When the transport's submission slots
    /// are full this call blocks until one frees up; it returns once the
    /// message is accepted for delivery, before any broker acknowledgment.
    async fn publish(&self, message: OutboundMessage, topic: &str) -> Result<()>;

    /// Submit a message and wait for the broker's acknowledgment, up to
    /// `timeout`. Returns [`crate::Error::AckTimeout`] when the wait
    /// elapses and [`crate::Error::Nacked`] on a negative acknowledgment.
    async fn publish_await_ack(
        &self,
        message: OutboundMessage,
        topic: &str,
        timeout: Duration,
    ) -> Result<()>;

    /// Take the receipt stream. Yields `Some` exactly once; the caller
    /// registers it before the first submit and consumes it from its own
    /// task.
    fn take_receipts(&self) -> Option<mpsc::UnboundedReceiver<PublishReceipt>>;

    /// Stop accepting submissions and wait up to `grace` for in-flight
    /// acknowledgments to drain. Messages still unacknowledged afterwards
    /// are surrendered to the transport's own retry policy.
    async fn terminate(&self, grace: Duration) -> Result<()>;
}

/// A bound queue flow delivering messages to the caller.
#[async_trait]
pub trait QueueFlow: Send {
    /// Wait up to `timeout` for the next delivery. `Ok(None)` is a normal
    /// empty tick, not an error.
    async fn receive(&mut self, timeout: Duration) -> Result<Option<InboundMessage>>;

    /// Stop delivery. Client-acknowledged messages still unsettled go back
    /// to the queue flagged as redelivered.
    async fn stop(&mut self) -> Result<()>;
}

/// A queue flow on a transacted session.
#[async_trait]
pub trait TransactedFlow: QueueFlow {
    /// Atomically acknowledge every message received since the previous
    /// commit. On failure the broker rolls the transaction back and the
    /// affected messages are redelivered.
    async fn commit(&mut self) -> Result<()>;
}
