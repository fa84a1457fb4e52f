//! Throughput counters, per-second sampling, and the end-of-run report.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Label printed in front of every stats line.
pub const API_NAME: &str = "Rust";

/// Shared throughput counters.
///
/// The driver loop writes, the sampler reads-and-resets. Visibility is
/// what the atomics buy us; a dropped increment under contention would be
/// acceptable, lost visibility would not.
#[derive(Debug, Default)]
pub struct Counters {
    sent_in_window: AtomicU64,
    received_in_window: AtomicU64,
    total: AtomicU64,
    redelivery_seen: AtomicBool,
}

impl Counters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The sent counter as it stands in the current window; doubles as the
    /// publisher's message sequence.
    pub fn sequence(&self) -> u64 {
        self.sent_in_window.load(Ordering::Acquire)
    }

    pub fn record_sent(&self) {
        self.sent_in_window.fetch_add(1, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.received_in_window.fetch_add(1, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn take_sent(&self) -> u64 {
        self.sent_in_window.swap(0, Ordering::AcqRel)
    }

    pub fn take_received(&self) -> u64 {
        self.received_in_window.swap(0, Ordering::AcqRel)
    }

    /// Sticky within a window: any redelivered message sets it, only the
    /// sampler clears it.
    pub fn mark_redelivery(&self) {
        self.redelivery_seen.store(true, Ordering::Release);
    }

    pub fn take_redelivery(&self) -> bool {
        self.redelivery_seen.swap(false, Ordering::AcqRel)
    }

    /// Messages over the whole run, unaffected by window resets.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// Which counter a driver samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Published,
    Received,
}

impl Direction {
    fn label(&self) -> &'static str {
        match self {
            Direction::Published => "Published",
            Direction::Received => "Received",
        }
    }

    fn take(&self, counters: &Counters) -> u64 {
        match self {
            Direction::Published => counters.take_sent(),
            Direction::Received => counters.take_received(),
        }
    }
}

/// Print one window sample and reset the window.
pub fn print_window(sample_name: &str, direction: Direction, counters: &Counters) {
    let count = direction.take(counters);
    println!("{API_NAME} {sample_name} {} msgs/s: {count}", direction.label());
    if counters.take_redelivery() {
        println!("*** Redelivery detected ***");
    }
}

/// Once-per-second sampler task, used by the publishers.
pub struct StatsSampler {
    handle: JoinHandle<()>,
}

impl StatsSampler {
    pub fn spawn(
        sample_name: &'static str,
        direction: Direction,
        counters: Arc<Counters>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the samples follow.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                print_window(sample_name, direction, &counters);
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

/// In-loop sampler for the consumers: reports once a second from the
/// driver's own task instead of a separate one.
pub struct WindowReporter {
    sample_name: &'static str,
    direction: Direction,
    mark: Instant,
}

impl WindowReporter {
    pub fn new(sample_name: &'static str, direction: Direction) -> Self {
        Self {
            sample_name,
            direction,
            mark: Instant::now(),
        }
    }

    pub fn maybe_report(&mut self, counters: &Counters) {
        if self.mark.elapsed() >= Duration::from_secs(1) {
            self.mark = Instant::now();
            print_window(self.sample_name, self.direction, counters);
        }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownReason {
    /// Operator input on stdin.
    Operator,
    /// Fatal transport failure or an unrecoverable loop error.
    Failure,
}

/// Machine-readable summary written at shutdown when the operator asked
/// for one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub driver: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub messages: u64,
    pub duration_secs: f64,
    pub average_rate: f64,
    pub shutdown: ShutdownReason,
}

impl RunReport {
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, &json)
            .with_context(|| format!("failed to write run report to {}", path.display()))?;
        tracing::info!("run report written to {}", path.display());
        Ok(())
    }
}

/// Captures run start state; finished into a [`RunReport`] at shutdown.
pub struct RunReportBuilder {
    driver: String,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl RunReportBuilder {
    pub fn start(driver: &str) -> Self {
        Self {
            driver: driver.to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn finish(self, messages: u64, shutdown: ShutdownReason) -> RunReport {
        let duration_secs = self.started.elapsed().as_secs_f64();
        let average_rate = if duration_secs > 0.0 {
            messages as f64 / duration_secs
        } else {
            0.0
        };
        RunReport {
            driver: self.driver,
            started_at: self.started_at,
            completed_at: Utc::now(),
            messages,
            duration_secs,
            average_rate,
            shutdown,
        }
    }
}
