//! Session, publisher and flow configuration.

use std::collections::HashMap;

/// Connection configuration handed to [`crate::Transport::connect`].
///
/// The named fields are the ones every implementation needs; everything
/// else the operator supplied travels verbatim in `extra` for the
/// implementation to interpret or ignore.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub vpn_name: String,
    pub username: String,
    pub password: String,
    pub reconnect_retries: u32,
    pub connect_retries_per_host: u32,
    pub extra: HashMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            vpn_name: "default".to_string(),
            username: "client1".to_string(),
            password: "client1pass".to_string(),
            reconnect_retries: 20,
            connect_retries_per_host: 5,
            extra: HashMap::new(),
        }
    }
}

/// Persistent-publisher configuration.
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    /// Number of submissions the transport accepts before `publish` blocks
    /// the caller. This wait is the drivers' only flow-control point toward
    /// the broker; implementations must not drop or buffer unboundedly.
    pub back_pressure_slots: usize,
    /// Ask the broker to acknowledge each message as soon as it is spooled
    /// rather than batching acknowledgments.
    pub ack_immediately: bool,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            back_pressure_slots: 1,
            ack_immediately: false,
        }
    }
}

/// How deliveries on a flow are acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// The transport acknowledges on delivery.
    Auto,
    /// The application settles each delivery's [`crate::AckHandle`].
    Client,
}

/// Whether one consumer owns the endpoint or several cooperate on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Exclusive,
    NonExclusive,
}

/// Queue-flow configuration.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub queue_name: String,
    pub ack_mode: AckMode,
    pub transport_window: u32,
    pub auto_start: bool,
    pub access_type: AccessType,
}

impl FlowSettings {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            ack_mode: AckMode::Auto,
            transport_window: 10,
            auto_start: true,
            access_type: AccessType::Exclusive,
        }
    }

    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    pub fn with_transport_window(mut self, window: u32) -> Self {
        self.transport_window = window;
        self
    }

    pub fn with_access_type(mut self, access_type: AccessType) -> Self {
        self.access_type = access_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_settings_builder() {
        let settings = FlowSettings::new("partitioned-queue-1")
            .with_ack_mode(AckMode::Client)
            .with_transport_window(100)
            .with_access_type(AccessType::NonExclusive);
        assert_eq!(settings.queue_name, "partitioned-queue-1");
        assert_eq!(settings.ack_mode, AckMode::Client);
        assert_eq!(settings.transport_window, 100);
        assert!(settings.auto_start);
        assert_eq!(settings.access_type, AccessType::NonExclusive);
    }

    #[test]
    fn test_publisher_settings_single_slot_default() {
        let settings = PublisherSettings::default();
        assert_eq!(settings.back_pressure_slots, 1);
        assert!(!settings.ack_immediately);
    }
}
