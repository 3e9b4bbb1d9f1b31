use crate::reporter::FailureReporter;
use crate::state::SnapshotStore;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub hosts_configured: u32,
    pub hosts_reporting: u32,
    pub suppressed_failures: u64,
    pub memory_usage_mb: f32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    hosts_configured: usize,
}

impl HealthTracker {
    pub fn new(hosts_configured: usize) -> Self {
        Self { start_time: Instant::now(), hosts_configured }
    }

    pub fn get_health(&self, store: &SnapshotStore, reporter: &FailureReporter) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            hosts_configured: self.hosts_configured as u32,
            hosts_reporting: store.len() as u32,
            suppressed_failures: reporter.suppressed(),
            memory_usage_mb: get_memory_usage_mb(),
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("VmRSS:") {
                    if let Some(Ok(kb)) = rest.split_whitespace().next().map(str::parse::<u64>) {
                        return kb as f32 / 1024.0; // KB -> MB
                    }
                }
            }
        }
    }

    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HostSnapshot;

    #[test]
    fn test_health_counts_reporting_hosts() {
        let store = SnapshotStore::new();
        store.write("alpha", HostSnapshot::empty());
        let reporter = FailureReporter::default();
        reporter.report("first");
        reporter.report("second");

        let health = HealthTracker::new(3).get_health(&store, &reporter);

        assert_eq!(health.hosts_configured, 3);
        assert_eq!(health.hosts_reporting, 1);
        assert_eq!(health.suppressed_failures, 1);
        assert!(health.memory_usage_mb >= 0.0);
    }
}
