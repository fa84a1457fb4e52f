//! Broker state: queues, routing, failure injection.

use pqdemo_transport::{Error, OutboundMessage, Result, SessionEvent};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Externally visible snapshot of a waiting message.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub payload: Vec<u8>,
    pub properties: HashMap<String, String>,
    pub redelivered: bool,
}

/// A message sitting in a queue, waiting for delivery.
#[derive(Debug, Clone)]
pub(crate) struct Delivery {
    pub id: u64,
    pub payload: Vec<u8>,
    pub properties: HashMap<String, String>,
    pub redelivered: bool,
}

struct QueueState {
    /// Topic prefix routed into this queue, if any.
    subscription: Option<String>,
    ready: VecDeque<Delivery>,
}

struct BrokerState {
    queues: HashMap<String, QueueState>,
    next_delivery_id: u64,
    submissions: u64,
    commits: u64,
}

/// The in-memory broker. Shared by every session, publisher and flow the
/// simulator hands out.
pub struct SimBroker {
    state: Mutex<BrokerState>,
    events: broadcast::Sender<SessionEvent>,
    nack_every: AtomicU64,
    ack_delay_ms: AtomicU64,
    commit_fail_every: AtomicU64,
    deny_bind: AtomicBool,
}

impl SimBroker {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            state: Mutex::new(BrokerState {
                queues: HashMap::new(),
                next_delivery_id: 0,
                submissions: 0,
                commits: 0,
            }),
            events,
            nack_every: AtomicU64::new(0),
            ack_delay_ms: AtomicU64::new(0),
            commit_fail_every: AtomicU64::new(0),
            deny_bind: AtomicBool::new(false),
        })
    }

    /// The transport handle drivers connect through.
    pub fn transport(self: &Arc<Self>) -> crate::SimTransport {
        crate::SimTransport::new(self.clone())
    }

    /// Create a queue, optionally routed from a topic prefix. A prefix of
    /// `"pqdemo"` receives everything published to `pqdemo` and below.
    pub fn provision_queue(&self, name: &str, subscription: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.queues.insert(
            name.to_string(),
            QueueState {
                subscription: subscription.map(str::to_string),
                ready: VecDeque::new(),
            },
        );
    }

    /// Drop a message straight into a queue, bypassing the publish path.
    pub fn seed_queue(&self, name: &str, message: OutboundMessage, redelivered: bool) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_delivery_id;
        state.next_delivery_id += 1;
        if let Some(queue) = state.queues.get_mut(name) {
            queue.ready.push_back(Delivery {
                id,
                payload: message.payload().to_vec(),
                properties: message.properties().clone(),
                redelivered,
            });
        }
    }

    /// Messages currently waiting in a queue.
    pub fn queue_depth(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.queues.get(name).map_or(0, |q| q.ready.len())
    }

    /// Snapshot a queue's waiting messages without consuming them.
    pub fn peek_queue(&self, name: &str) -> Vec<QueuedMessage> {
        let state = self.state.lock().unwrap();
        state.queues.get(name).map_or_else(Vec::new, |q| {
            q.ready
                .iter()
                .map(|d| QueuedMessage {
                    payload: d.payload.clone(),
                    properties: d.properties.clone(),
                    redelivered: d.redelivered,
                })
                .collect()
        })
    }

    /// Inject a session event, as a broker outage or rebind would.
    pub fn emit_event(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// NACK every `n`th submission; `None` disables.
    pub fn set_nack_every(&self, n: Option<u64>) {
        self.nack_every.store(n.unwrap_or(0), Ordering::Release);
    }

    /// Delay every acknowledgment by `delay`; `None` disables.
    pub fn set_ack_delay(&self, delay: Option<Duration>) {
        self.ack_delay_ms
            .store(delay.map_or(0, |d| d.as_millis() as u64), Ordering::Release);
    }

    /// Fail every `n`th transacted commit; `None` disables.
    pub fn set_commit_fail_every(&self, n: Option<u64>) {
        self.commit_fail_every.store(n.unwrap_or(0), Ordering::Release);
    }

    /// Refuse subsequent queue binds with a not-supported error.
    pub fn set_deny_bind(&self, deny: bool) {
        self.deny_bind.store(deny, Ordering::Release);
    }

    pub(crate) fn bind_denied(&self) -> bool {
        self.deny_bind.load(Ordering::Acquire)
    }

    pub(crate) fn has_queue(&self, name: &str) -> bool {
        self.state.lock().unwrap().queues.contains_key(name)
    }

    pub(crate) fn ack_delay(&self) -> Option<Duration> {
        match self.ack_delay_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub(crate) fn events_sender(&self) -> &broadcast::Sender<SessionEvent> {
        &self.events
    }

    /// Accept one publisher submission: count it, apply the NACK schedule,
    /// and on acceptance route a delivery into every subscribed queue.
    pub(crate) fn accept_submission(&self, topic: &str, message: &OutboundMessage) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.submissions += 1;
        let submissions = state.submissions;

        let nack_every = self.nack_every.load(Ordering::Acquire);
        if nack_every > 0 && submissions % nack_every == 0 {
            return Err(Error::Nacked(format!(
                "synthetic failure for submission {submissions}"
            )));
        }

        let id = state.next_delivery_id;
        state.next_delivery_id += 1;
        for queue in state.queues.values_mut() {
            let matched = queue
                .subscription
                .as_deref()
                .is_some_and(|prefix| subscription_matches(prefix, topic));
            if matched {
                queue.ready.push_back(Delivery {
                    id,
                    payload: message.payload().to_vec(),
                    properties: message.properties().clone(),
                    redelivered: false,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn pop_delivery(&self, queue: &str) -> Option<Delivery> {
        let mut state = self.state.lock().unwrap();
        state.queues.get_mut(queue)?.ready.pop_front()
    }

    /// Return deliveries to the front of their queue, flagged redelivered
    /// and in their original order.
    pub(crate) fn requeue_front(&self, queue: &str, deliveries: Vec<Delivery>) {
        if deliveries.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap();
        if let Some(queue) = state.queues.get_mut(queue) {
            for mut delivery in deliveries.into_iter().rev() {
                delivery.redelivered = true;
                queue.ready.push_front(delivery);
            }
        }
    }

    /// Count a commit and report whether the failure schedule hits it.
    pub(crate) fn next_commit_fails(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.commits += 1;
        let fail_every = self.commit_fail_every.load(Ordering::Acquire);
        fail_every > 0 && state.commits % fail_every == 0
    }
}

fn subscription_matches(prefix: &str, topic: &str) -> bool {
    topic == prefix || topic.starts_with(&format!("{prefix}/"))
}
