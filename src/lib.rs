//! Rate-controlled demo clients for a partitioned-queue message broker.
//!
//! Each driver is a single paced loop around a messaging transport:
//! publishers emit fixed-size messages on dynamically constructed topics
//! with a per-message partition key; consumers bind a queue flow, throttle
//! delivery to a target rate, and acknowledge per message or by committing
//! fixed-size transactions. A per-second sampler reports observed
//! throughput and flags redeliveries.
//!
//! The transport itself is a capability defined in `pqdemo-transport`;
//! the binary wires in the in-memory simulator from
//! `pqdemo-transport-sim`, and a vendor SDK adapter implementing the same
//! contract slots into the same place.

pub mod config;
pub mod consumer;
pub mod keygen;
pub mod lifecycle;
pub mod pacer;
pub mod publisher;
pub mod stats;

mod events;

pub use config::{Config, ConfigError, ConfigSource, Role};
pub use keygen::{KeyPolicy, KeyTopicGenerator};
pub use lifecycle::{DriverState, Lifecycle, ShutdownLatch};
pub use pacer::RatePacer;
pub use stats::{Counters, RunReport, ShutdownReason};
