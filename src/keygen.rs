//! Per-message topic and partition-key generation.

use uuid::Uuid;

/// The four location segments topics rotate through.
pub const LOCATION_CODES: [&str; 4] = ["NA", "UK", "EU", "APAC"];

/// How partition keys are minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// A fresh type-4 UUID per message; effectively collision-free.
    RandomUuid,
    /// An order identifier drawn uniformly from `1..=unique_keys`,
    /// zero-padded to five digits.
    RotatingOrder,
}

/// Produces `(topic, partition key)` pairs for the publishers.
///
/// Topics take the shape `<prefix>/<location>/<sequence>`; the location is
/// drawn uniformly from [`LOCATION_CODES`] and the sequence is the caller's
/// sent counter.
#[derive(Debug, Clone)]
pub struct KeyTopicGenerator {
    topic_prefix: String,
    policy: KeyPolicy,
    unique_keys: u32,
}

impl KeyTopicGenerator {
    pub fn new(topic_prefix: impl Into<String>, policy: KeyPolicy, unique_keys: u32) -> Self {
        Self {
            topic_prefix: topic_prefix.into(),
            policy,
            unique_keys: unique_keys.max(1),
        }
    }

    pub fn next(&self, sequence: u64) -> (String, String) {
        let location = random_location_code();
        let topic = format!("{}/{}/{}", self.topic_prefix, location, sequence);
        let key = match self.policy {
            KeyPolicy::RandomUuid => Uuid::new_v4().to_string(),
            KeyPolicy::RotatingOrder => random_order_key(self.unique_keys),
        };
        (topic, key)
    }
}

pub fn random_location_code() -> &'static str {
    use rand::Rng;
    LOCATION_CODES[rand::rng().random_range(0..LOCATION_CODES.len())]
}

// Zero-padded to a fixed five digits so every publisher in a run produces
// identically shaped keys.
fn random_order_key(unique_keys: u32) -> String {
    use rand::Rng;
    format!("{:05}", rand::rng().random_range(1..=unique_keys))
}
