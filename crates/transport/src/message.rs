//! Message types crossing the transport boundary.

use crate::error::Error;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;

/// User-property key carrying the partition key on every outbound message.
///
/// The broker shards a partitioned queue by this property; messages with
/// equal values preserve FIFO to a single consumer.
pub const PARTITION_KEY_PROPERTY: &str = "queue-partition-key";

/// A message on its way to the broker: payload bytes plus a string
/// user-property map. The drivers put exactly one property on it, the
/// partition key.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    payload: Vec<u8>,
    properties: HashMap<String, String>,
}

impl OutboundMessage {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            properties: HashMap::new(),
        }
    }

    /// Attach a user property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// The partition key, if one was attached.
    pub fn partition_key(&self) -> Option<&str> {
        self.properties.get(PARTITION_KEY_PROPERTY).map(String::as_str)
    }
}

impl fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.partition_key() {
            Some(key) => write!(f, "message[key={}, {} bytes]", key, self.payload.len()),
            None => write!(f, "message[{} bytes]", self.payload.len()),
        }
    }
}

/// Broker verdict on a previously submitted message, delivered on the
/// publisher's receipt stream. `error: None` is an ACK; `Some` is a NACK
/// with the cause.
#[derive(Debug)]
pub struct PublishReceipt {
    pub message: OutboundMessage,
    /// Caller-supplied context from submit time, if any. NACK logging
    /// prefers it over the message itself.
    pub user_context: Option<String>,
    pub error: Option<Error>,
}

impl PublishReceipt {
    pub fn is_ack(&self) -> bool {
        self.error.is_none()
    }
}

/// One-shot acknowledgment handle for a delivered message.
///
/// Settling the handle tells the broker the message is fully processed and
/// may be removed from the queue. Dropping it unsettled leaves the message
/// eligible for redelivery.
#[derive(Debug)]
pub struct AckHandle {
    sender: mpsc::UnboundedSender<u64>,
    delivery_id: u64,
}

impl AckHandle {
    pub fn new(sender: mpsc::UnboundedSender<u64>, delivery_id: u64) -> Self {
        Self {
            sender,
            delivery_id,
        }
    }

    /// Acknowledge the delivery. Acknowledgments are asynchronous; the send
    /// itself never blocks.
    pub fn settle(self) {
        let _ = self.sender.send(self.delivery_id);
    }
}

/// A message delivered from a queue flow.
#[derive(Debug)]
pub struct InboundMessage {
    payload: Vec<u8>,
    properties: HashMap<String, String>,
    redelivered: bool,
    ack: Option<AckHandle>,
}

impl InboundMessage {
    pub fn new(
        payload: Vec<u8>,
        properties: HashMap<String, String>,
        redelivered: bool,
        ack: Option<AckHandle>,
    ) -> Self {
        Self {
            payload,
            properties,
            redelivered,
            ack,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Broker redelivery flag: set when this message was delivered before
    /// and not acknowledged.
    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    /// Acknowledge the message. Must be called only after all processing of
    /// the message is complete. A no-op for auto-acknowledged and transacted
    /// deliveries, which carry no handle.
    pub fn ack(mut self) {
        if let Some(handle) = self.ack.take() {
            handle.settle();
        }
    }
}
