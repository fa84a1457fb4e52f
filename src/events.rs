//! Session event logging shared by every driver.

use pqdemo_transport::SessionEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Consume a session's event stream from a dedicated task and log it.
///
/// A service interruption is warn-level only: it does not latch shutdown,
/// and reconnecting is left entirely to the transport.
pub(crate) fn spawn_session_event_logger(
    mut events: broadcast::Receiver<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::ServiceInterrupted { reason }) => {
                    tracing::warn!("### SERVICE INTERRUPTION: {reason}");
                }
                Ok(event) => {
                    tracing::info!("### {event}");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("session event stream lagged, {skipped} events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
