//! In-memory broker simulator for the pqdemo drivers.
//!
//! Implements the full `pqdemo-transport` contract against process-local
//! state so the drivers and their scenario tests run without a broker:
//!
//! - Queues provisioned by name, fed by topic-prefix subscriptions, with
//!   per-partition-key FIFO preserved.
//! - A bounded-slot submission path: `publish` blocks the caller while the
//!   slots are occupied, which is exactly the backpressure wait the
//!   drivers rely on.
//! - Failure injection for the interesting paths: NACK every Nth
//!   submission, a fixed acknowledgment delay (drives ack timeouts in the
//!   blocking publisher), synthetic commit failures (drives transacted
//!   rollback and redelivery), and bind denial.
//! - Redelivery semantics: client-acknowledged messages left unsettled
//!   when a flow stops, and every message of a rolled-back transaction,
//!   return to the front of their queue flagged as redelivered.
//!
//! The simulator is deliberately small: no persistence, no wire format,
//! one delivery order per queue.

mod broker;
mod flow;
mod publisher;
mod session;

pub use broker::{QueuedMessage, SimBroker};
pub use session::SimTransport;
