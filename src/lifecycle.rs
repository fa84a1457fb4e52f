//! Driver lifecycle state and the shutdown latch.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;

/// Coarse per-process driver state. A service-interruption event from the
/// transport does not transition the state; reconnecting is the
/// transport's problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Configuring,
    Connecting,
    Running,
    Draining,
    Closed,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Configuring => "configuring",
            DriverState::Connecting => "connecting",
            DriverState::Running => "running",
            DriverState::Draining => "draining",
            DriverState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Tracks and logs the state progression of one driver process.
pub struct Lifecycle {
    driver: &'static str,
    state: DriverState,
}

impl Lifecycle {
    pub fn new(driver: &'static str) -> Self {
        tracing::info!(driver, state = %DriverState::Configuring, "driver starting");
        Self {
            driver,
            state: DriverState::Configuring,
        }
    }

    pub fn advance(&mut self, next: DriverState) {
        tracing::info!(driver = self.driver, from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    pub fn state(&self) -> DriverState {
        self.state
    }
}

/// Set-once, observe-many shutdown flag shared across the driver loop,
/// the transport callback tasks, and the samplers. Observation is
/// eventually consistent: the loop notices at its next guard check.
#[derive(Debug, Clone, Default)]
pub struct ShutdownLatch {
    flag: Arc<AtomicBool>,
}

impl ShutdownLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Latch shutdown as soon as the operator types anything on stdin.
/// End-of-file is not a signal; a detached process keeps running.
pub fn spawn_stdin_watcher(latch: ShutdownLatch) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buffer = [0u8; 1];
        if let Ok(n) = stdin.read(&mut buffer).await {
            if n > 0 {
                tracing::info!("operator input received, shutting down");
                latch.set();
            }
        }
    })
}
