//! Transport error taxonomy.

use std::time::Duration;

/// Errors surfaced by a transport implementation.
///
/// Bind failures and a dropped session are fatal for the driver holding
/// them; negative acknowledgments, acknowledgment timeouts and service
/// interruptions are transient and the drivers log and carry on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The broker refuses this kind of bind outright (endpoint type or
    /// permissions). The process has no way to make progress.
    #[error("queue bind not supported: {0}")]
    BindNotSupported(String),

    /// The bind failed for another reason: queue missing, shut down, etc.
    #[error("could not bind to queue: {0}")]
    BindFailed(String),

    /// A submit call failed before the message was handed to the broker.
    #[error("publish submission failed: {0}")]
    SubmitFailed(String),

    /// The broker negatively acknowledged a message it had accepted.
    #[error("negative acknowledgment from broker: {0}")]
    Nacked(String),

    /// No acknowledgment arrived within the caller's wait window.
    #[error("no acknowledgment within {0:?}")]
    AckTimeout(Duration),

    /// A transacted commit was rejected; the broker rolls the transaction
    /// back and redelivers the affected messages.
    #[error("transaction commit failed: {0}")]
    CommitFailed(String),

    /// The caller was interrupted while waiting on the transport.
    #[error("interrupted: {0}")]
    Interrupted(String),

    /// The session is gone and will not come back.
    #[error("session disconnected")]
    Disconnected,
}

impl Error {
    /// Whether the driver should stop rather than retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::BindNotSupported(_) | Error::BindFailed(_) | Error::Disconnected
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::BindNotSupported("acl".into()).is_fatal());
        assert!(Error::BindFailed("no such queue".into()).is_fatal());
        assert!(Error::Disconnected.is_fatal());

        assert!(!Error::Nacked("spool over quota".into()).is_fatal());
        assert!(!Error::AckTimeout(Duration::from_secs(2)).is_fatal());
        assert!(!Error::SubmitFailed("closed".into()).is_fatal());
        assert!(!Error::Interrupted("shutdown".into()).is_fatal());
        assert!(!Error::CommitFailed("rolled back".into()).is_fatal());
    }
}
