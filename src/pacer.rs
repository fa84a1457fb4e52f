//! Iteration-level rate pacing.

use std::time::{Duration, Instant};

/// Holds a driver loop to an average rate by sleeping out the remainder of
/// each iteration's target interval.
///
/// This is averaging, not hard scheduling: if an iteration's work already
/// exceeded the interval, the pacer yields and the loop continues
/// immediately. At the maximum rate of 1000 msgs/s the interval is 1 ms
/// and zero-length sleeps are normal.
#[derive(Debug, Clone)]
pub struct RatePacer {
    target: Duration,
}

impl RatePacer {
    pub fn new(rate_per_second: u32) -> Self {
        let rate = rate_per_second.clamp(1, 1000);
        Self {
            target: Duration::from_millis(1000 / rate as u64),
        }
    }

    pub fn target_interval(&self) -> Duration {
        self.target
    }

    /// Sleep away whatever is left of the interval that began at
    /// `iteration_start`.
    pub async fn pace(&self, iteration_start: Instant) {
        let remaining = remaining_sleep(self.target, iteration_start.elapsed());
        if remaining.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(remaining).await;
        }
    }
}

fn remaining_sleep(target: Duration, elapsed: Duration) -> Duration {
    target.saturating_sub(elapsed)
}
