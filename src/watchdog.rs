//! Liveness watchdog.
//!
//! The fixture is headless and may sit unattended for days; if the host
//! stops talking for long enough the agent assumes something upstream has
//! wedged and restarts itself. The session resets the deadline every time a
//! checksum-valid frame arrives, whatever its header.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error};

/// Watchdog timing parameters.
#[derive(Debug, Clone, Copy)]
pub struct WatchdogConfig {
    /// Silence tolerated before a restart.
    pub interval: Duration,
    /// How often the deadline is checked.
    pub check_period: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            check_period: Duration::from_secs(1),
        }
    }
}

/// Performs the restart when the deadline passes.
pub trait Restarter: Send + Sync + 'static {
    /// Restart the agent. The production implementation does not return.
    fn restart(&self);
}

/// Terminates the process; the supervisor is expected to relaunch the
/// agent, which is the closest host-side analog of a hardware reset.
pub struct ProcessRestarter;

impl Restarter for ProcessRestarter {
    fn restart(&self) {
        error!("liveness deadline passed, restarting");
        std::process::exit(1);
    }
}

struct Shared {
    /// Time base for the deadline arithmetic.
    epoch: Instant,
    interval_ms: u64,
    /// Absolute deadline in milliseconds since `epoch`.
    deadline_ms: AtomicU64,
}

impl Shared {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Handle used to feed the watchdog.
#[derive(Clone)]
pub struct WatchdogHandle {
    shared: Arc<Shared>,
}

impl WatchdogHandle {
    /// Push the deadline out to now plus the configured interval.
    pub fn reset(&self) {
        let deadline = self.shared.now_ms() + self.shared.interval_ms;
        self.shared.deadline_ms.store(deadline, Ordering::Relaxed);
    }
}

/// The watchdog task.
pub struct Watchdog;

impl Watchdog {
    /// Arm the watchdog and spawn its checking task.
    ///
    /// The first deadline starts counting immediately; a fixture that never
    /// hears from the host at all still restarts. The restarter fires at
    /// most once. There is no way to stop the watchdog short of restarting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: WatchdogConfig, restarter: Arc<dyn Restarter>) -> WatchdogHandle {
        let interval_ms = config.interval.as_millis() as u64;
        let shared = Arc::new(Shared {
            epoch: Instant::now(),
            interval_ms,
            deadline_ms: AtomicU64::new(interval_ms),
        });
        let handle = WatchdogHandle {
            shared: Arc::clone(&shared),
        };

        tokio::spawn(async move {
            debug!(interval_ms, "watchdog armed");
            loop {
                tokio::time::sleep(config.check_period).await;
                if shared.now_ms() >= shared.deadline_ms.load(Ordering::Relaxed) {
                    restarter.restart();
                    return;
                }
            }
        });

        handle
    }
}
