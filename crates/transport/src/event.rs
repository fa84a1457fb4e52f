//! Session lifecycle and flow events.

use std::fmt;

/// Events a session emits while the drivers run.
///
/// None of these change driver state on their own: a service interruption
/// is logged and reconnection is left entirely to the transport.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Connectivity to the broker was lost.
    ServiceInterrupted { reason: String },
    /// The transport is trying another host or retry.
    ReconnectionAttempt { host: String },
    /// Connectivity was restored.
    Reconnected { host: String },
    /// A queue flow became the active consumer for its endpoint.
    FlowActive { queue: String },
    /// A queue flow lost its bind and is rebinding.
    FlowReconnecting { queue: String },
    /// A queue flow rebound after an outage.
    FlowReconnected { queue: String },
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::ServiceInterrupted { reason } => {
                write!(f, "service interruption: {reason}")
            }
            SessionEvent::ReconnectionAttempt { host } => {
                write!(f, "reconnection attempt: {host}")
            }
            SessionEvent::Reconnected { host } => write!(f, "reconnected: {host}"),
            SessionEvent::FlowActive { queue } => write!(f, "flow active: {queue}"),
            SessionEvent::FlowReconnecting { queue } => write!(f, "flow reconnecting: {queue}"),
            SessionEvent::FlowReconnected { queue } => write!(f, "flow reconnected: {queue}"),
        }
    }
}
