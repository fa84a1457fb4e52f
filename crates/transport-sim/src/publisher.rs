//! Simulated persistent publisher with bounded-slot backpressure.

use crate::broker::SimBroker;
use async_trait::async_trait;
use pqdemo_transport::{
    Error, MessagePublisher, OutboundMessage, PublishReceipt, PublisherSettings, Result,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

struct Submission {
    message: OutboundMessage,
    topic: String,
    /// Present for publish-and-await calls; the worker answers here
    /// instead of the receipt stream.
    ack: Option<oneshot::Sender<Result<()>>>,
}

pub(crate) struct SimPublisher {
    submit_tx: Mutex<Option<mpsc::Sender<Submission>>>,
    receipts: Mutex<Option<mpsc::UnboundedReceiver<PublishReceipt>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SimPublisher {
    pub(crate) fn start(broker: Arc<SimBroker>, settings: PublisherSettings) -> Self {
        let slots = settings.back_pressure_slots.max(1);
        let (submit_tx, submit_rx) = mpsc::channel(slots);
        let (receipts_tx, receipts_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(broker, submit_rx, receipts_tx));
        Self {
            submit_tx: Mutex::new(Some(submit_tx)),
            receipts: Mutex::new(Some(receipts_rx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<Submission>> {
        self.submit_tx
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::SubmitFailed("publisher terminated".to_string()))
    }
}

/// Consumes submissions one at a time: applies the broker's NACK schedule
/// and acknowledgment delay, then answers on the per-call channel or the
/// receipt stream.
async fn run_worker(
    broker: Arc<SimBroker>,
    mut submissions: mpsc::Receiver<Submission>,
    receipts: mpsc::UnboundedSender<PublishReceipt>,
) {
    while let Some(submission) = submissions.recv().await {
        let verdict = broker.accept_submission(&submission.topic, &submission.message);
        if let Some(delay) = broker.ack_delay() {
            tokio::time::sleep(delay).await;
        }
        match submission.ack {
            Some(ack) => {
                let _ = ack.send(verdict);
            }
            None => {
                let _ = receipts.send(PublishReceipt {
                    message: submission.message,
                    user_context: None,
                    error: verdict.err(),
                });
            }
        }
    }
}

#[async_trait]
impl MessagePublisher for SimPublisher {
    async fn publish(&self, message: OutboundMessage, topic: &str) -> Result<()> {
        let sender = self.sender()?;
        sender
            .send(Submission {
                message,
                topic: topic.to_string(),
                ack: None,
            })
            .await
            .map_err(|_| Error::SubmitFailed("submission channel closed".to_string()))
    }

    async fn publish_await_ack(
        &self,
        message: OutboundMessage,
        topic: &str,
        timeout: Duration,
    ) -> Result<()> {
        let sender = self.sender()?;
        let (ack_tx, ack_rx) = oneshot::channel();
        let submit_and_wait = async {
            sender
                .send(Submission {
                    message,
                    topic: topic.to_string(),
                    ack: Some(ack_tx),
                })
                .await
                .map_err(|_| Error::SubmitFailed("submission channel closed".to_string()))?;
            ack_rx.await.map_err(|_| Error::Disconnected)?
        };
        match tokio::time::timeout(timeout, submit_and_wait).await {
            Ok(result) => result,
            Err(_) => Err(Error::AckTimeout(timeout)),
        }
    }

    fn take_receipts(&self) -> Option<mpsc::UnboundedReceiver<PublishReceipt>> {
        self.receipts.lock().unwrap().take()
    }

    async fn terminate(&self, grace: Duration) -> Result<()> {
        // Closing the submission channel lets the worker drain what it has.
        drop(self.submit_tx.lock().unwrap().take());
        let worker = self.worker.lock().unwrap().take();
        if let Some(worker) = worker {
            if tokio::time::timeout(grace, worker).await.is_err() {
                tracing::debug!("publisher worker still draining after grace window");
            }
        }
        Ok(())
    }
}
