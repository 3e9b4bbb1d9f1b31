use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Minimum spacing between two emitted failure warnings.
pub const FAILURE_COOLDOWN: Duration = Duration::from_secs(300);

/// Process-wide gate for failure warnings.
///
/// One channel for every host and every kind of failure: once a message goes
/// out, everything reported during the next `cooldown` is dropped, whichever
/// host it comes from.
pub struct FailureReporter {
    cooldown: Duration,
    last_emitted: Mutex<Option<Instant>>,
    suppressed: AtomicU64,
}

impl FailureReporter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_emitted: Mutex::new(None),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Logs `message` unless another one went out within the cooldown.
    /// Returns whether it was emitted.
    pub fn report(&self, message: &str) -> bool {
        self.report_at(Instant::now(), message)
    }

    pub(crate) fn report_at(&self, now: Instant, message: &str) -> bool {
        {
            let mut last = self.last_emitted.lock();
            if let Some(previous) = *last {
                if now.saturating_duration_since(previous) < self.cooldown {
                    self.suppressed.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
            }
            *last = Some(now);
        }

        warn!("{}", message);
        true
    }

    /// Messages dropped since startup
    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }
}

impl Default for FailureReporter {
    fn default() -> Self {
        Self::new(FAILURE_COOLDOWN)
    }
}
