//! Messaging transport contract for the pqdemo drivers.
//!
//! This crate defines the boundary between the rate-controlled drivers and
//! whatever broker client actually moves bytes: a vendor SDK adapter in a
//! real deployment, or the in-memory simulator from `pqdemo-transport-sim`
//! in tests and local runs.
//!
//! # What the contract covers
//!
//! - **Sessions**: connection establishment from an opaque configuration
//!   bag, lifecycle events (interruption, reconnection, flow activity), and
//!   disconnect.
//! - **Publishers**: persistent publishing with a bounded-slot backpressure
//!   wait, asynchronous publish receipts (ACK/NACK), and a blocking
//!   publish-and-await-acknowledgment call.
//! - **Flows**: queue binds with configurable acknowledgment mode, window
//!   size and access type; plain receives and transacted receives with
//!   atomic batch commits.
//!
//! # What it deliberately leaves out
//!
//! Wire framing, TLS, authentication exchanges, and reconnection mechanics
//! are the implementation's business. The only wire-visible guarantees the
//! drivers rely on are the single partition-key user property on every
//! outbound message and the redelivered flag on every inbound one.

pub mod error;
pub mod event;
pub mod message;
pub mod session;
pub mod settings;

pub use error::{Error, Result};
pub use event::SessionEvent;
pub use message::{
    AckHandle, InboundMessage, OutboundMessage, PublishReceipt, PARTITION_KEY_PROPERTY,
};
pub use session::{MessagePublisher, QueueFlow, Session, TransactedFlow, Transport};
pub use settings::{AccessType, AckMode, FlowSettings, PublisherSettings, SessionConfig};
