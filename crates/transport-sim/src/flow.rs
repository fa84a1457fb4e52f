//! Simulated queue flows: plain client-acknowledged and transacted.

use crate::broker::{Delivery, SimBroker};
use async_trait::async_trait;
use pqdemo_transport::{
    AckHandle, AckMode, Error, InboundMessage, QueueFlow, Result, TransactedFlow,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// How often a waiting receive re-checks the queue.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub(crate) struct SimFlow {
    broker: Arc<SimBroker>,
    queue: String,
    ack_mode: AckMode,
    ack_tx: mpsc::UnboundedSender<u64>,
    ack_rx: mpsc::UnboundedReceiver<u64>,
    /// Client-mode deliveries handed out but not yet settled.
    outstanding: HashMap<u64, Delivery>,
    stopped: bool,
}

impl SimFlow {
    pub(crate) fn new(broker: Arc<SimBroker>, queue: String, ack_mode: AckMode) -> Self {
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        Self {
            broker,
            queue,
            ack_mode,
            ack_tx,
            ack_rx,
            outstanding: HashMap::new(),
            stopped: false,
        }
    }

    fn drain_acks(&mut self) {
        while let Ok(delivery_id) = self.ack_rx.try_recv() {
            self.outstanding.remove(&delivery_id);
        }
    }
}

async fn wait_for_delivery(
    broker: &SimBroker,
    queue: &str,
    timeout: Duration,
) -> Option<Delivery> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(delivery) = broker.pop_delivery(queue) {
            return Some(delivery);
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[async_trait]
impl QueueFlow for SimFlow {
    async fn receive(&mut self, timeout: Duration) -> Result<Option<InboundMessage>> {
        if self.stopped {
            return Err(Error::Disconnected);
        }
        self.drain_acks();
        let Some(delivery) = wait_for_delivery(&self.broker, &self.queue, timeout).await else {
            return Ok(None);
        };
        let ack = match self.ack_mode {
            AckMode::Auto => None,
            AckMode::Client => {
                self.outstanding.insert(delivery.id, delivery.clone());
                Some(AckHandle::new(self.ack_tx.clone(), delivery.id))
            }
        };
        Ok(Some(InboundMessage::new(
            delivery.payload,
            delivery.properties,
            delivery.redelivered,
            ack,
        )))
    }

    async fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.drain_acks();
        let mut unsettled: Vec<Delivery> = self.outstanding.drain().map(|(_, d)| d).collect();
        unsettled.sort_by_key(|d| d.id);
        if !unsettled.is_empty() {
            tracing::debug!(
                queue = %self.queue,
                count = unsettled.len(),
                "returning unacknowledged deliveries for redelivery"
            );
        }
        self.broker.requeue_front(&self.queue, unsettled);
        Ok(())
    }
}

pub(crate) struct SimTransactedFlow {
    broker: Arc<SimBroker>,
    queue: String,
    /// Everything received since the last successful commit.
    uncommitted: Vec<Delivery>,
    stopped: bool,
}

impl SimTransactedFlow {
    pub(crate) fn new(broker: Arc<SimBroker>, queue: String) -> Self {
        Self {
            broker,
            queue,
            uncommitted: Vec::new(),
            stopped: false,
        }
    }

    fn roll_back(&mut self) {
        let batch = std::mem::take(&mut self.uncommitted);
        self.broker.requeue_front(&self.queue, batch);
    }
}

#[async_trait]
impl QueueFlow for SimTransactedFlow {
    async fn receive(&mut self, timeout: Duration) -> Result<Option<InboundMessage>> {
        if self.stopped {
            return Err(Error::Disconnected);
        }
        let Some(delivery) = wait_for_delivery(&self.broker, &self.queue, timeout).await else {
            return Ok(None);
        };
        self.uncommitted.push(delivery.clone());
        Ok(Some(InboundMessage::new(
            delivery.payload,
            delivery.properties,
            delivery.redelivered,
            None,
        )))
    }

    async fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.roll_back();
        Ok(())
    }
}

#[async_trait]
impl TransactedFlow for SimTransactedFlow {
    async fn commit(&mut self) -> Result<()> {
        if self.broker.next_commit_fails() {
            let count = self.uncommitted.len();
            self.roll_back();
            return Err(Error::CommitFailed(format!(
                "synthetic commit failure, {count} deliveries rolled back"
            )));
        }
        self.uncommitted.clear();
        Ok(())
    }
}
