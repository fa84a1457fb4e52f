//! Simulated transport and session.

use crate::broker::SimBroker;
use crate::flow::{SimFlow, SimTransactedFlow};
use crate::publisher::SimPublisher;
use async_trait::async_trait;
use pqdemo_transport::{
    Error, FlowSettings, MessagePublisher, PublisherSettings, QueueFlow, Result, Session,
    SessionConfig, SessionEvent, TransactedFlow, Transport,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Transport handle over a shared [`SimBroker`].
pub struct SimTransport {
    broker: Arc<SimBroker>,
}

impl SimTransport {
    pub fn new(broker: Arc<SimBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl Transport for SimTransport {
    async fn connect(&self, config: &SessionConfig) -> Result<Box<dyn Session>> {
        tracing::debug!(
            host = %config.host,
            vpn = %config.vpn_name,
            "simulated session established"
        );
        Ok(Box::new(SimSession {
            broker: self.broker.clone(),
        }))
    }
}

struct SimSession {
    broker: Arc<SimBroker>,
}

impl SimSession {
    fn check_bind(&self, settings: &FlowSettings) -> Result<()> {
        if self.broker.bind_denied() {
            return Err(Error::BindNotSupported(format!(
                "binds to '{}' are not permitted",
                settings.queue_name
            )));
        }
        if !self.broker.has_queue(&settings.queue_name) {
            return Err(Error::BindFailed(format!(
                "queue '{}' does not exist on this broker",
                settings.queue_name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for SimSession {
    async fn create_publisher(
        &self,
        settings: PublisherSettings,
    ) -> Result<Box<dyn MessagePublisher>> {
        Ok(Box::new(SimPublisher::start(self.broker.clone(), settings)))
    }

    async fn bind_queue(&self, settings: FlowSettings) -> Result<Box<dyn QueueFlow>> {
        self.check_bind(&settings)?;
        self.broker.emit_event(SessionEvent::FlowActive {
            queue: settings.queue_name.clone(),
        });
        Ok(Box::new(SimFlow::new(
            self.broker.clone(),
            settings.queue_name,
            settings.ack_mode,
        )))
    }

    async fn bind_transacted(&self, settings: FlowSettings) -> Result<Box<dyn TransactedFlow>> {
        self.check_bind(&settings)?;
        self.broker.emit_event(SessionEvent::FlowActive {
            queue: settings.queue_name.clone(),
        });
        Ok(Box::new(SimTransactedFlow::new(
            self.broker.clone(),
            settings.queue_name,
        )))
    }

    fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.broker.events_sender().subscribe()
    }

    async fn disconnect(&self) -> Result<()> {
        tracing::debug!("simulated session disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_missing_queue_fails() {
        let broker = SimBroker::new();
        let session = broker
            .transport()
            .connect(&SessionConfig::default())
            .await
            .unwrap();
        let result = session.bind_queue(FlowSettings::new("nowhere")).await;
        assert!(matches!(result, Err(Error::BindFailed(_))));
    }

    #[tokio::test]
    async fn test_bind_denied_is_not_supported() {
        let broker = SimBroker::new();
        broker.provision_queue("pq-1", None);
        broker.set_deny_bind(true);
        let session = broker
            .transport()
            .connect(&SessionConfig::default())
            .await
            .unwrap();
        let result = session.bind_queue(FlowSettings::new("pq-1")).await;
        assert!(matches!(result, Err(Error::BindNotSupported(_))));
    }

    #[tokio::test]
    async fn test_bind_emits_flow_active_event() {
        let broker = SimBroker::new();
        broker.provision_queue("pq-1", None);
        let session = broker
            .transport()
            .connect(&SessionConfig::default())
            .await
            .unwrap();
        let mut events = session.subscribe_events();
        let _flow = session.bind_queue(FlowSettings::new("pq-1")).await.unwrap();
        match events.recv().await.unwrap() {
            SessionEvent::FlowActive { queue } => assert_eq!(queue, "pq-1"),
            other => panic!("unexpected event: {other}"),
        }
    }
}
