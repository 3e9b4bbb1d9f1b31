use crate::executor::RemoteExecutor;
use crate::models::{HostDescriptor, HostSnapshot, Probe};
use crate::state::SnapshotStore;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error};

/// Pause between the end of one poll cycle and the start of the next.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polling loop of a single host.
pub struct HostMonitor {
    host: HostDescriptor,
    executor: Arc<dyn RemoteExecutor>,
    store: SnapshotStore,
    interval: Duration,
}

impl HostMonitor {
    pub fn new(
        host: HostDescriptor,
        executor: Arc<dyn RemoteExecutor>,
        store: SnapshotStore,
        interval: Duration,
    ) -> Self {
        Self { host, executor, store, interval }
    }

    pub fn host_id(&self) -> &str {
        self.host.id()
    }

    /// Runs the four probes one after the other and assembles the snapshot.
    /// A failed or empty probe leaves its field at [`NO_DATA`](crate::models::NO_DATA).
    pub async fn poll_cycle(&self) -> HostSnapshot {
        let mut snapshot = HostSnapshot::empty();
        for probe in Probe::ALL {
            match self.executor.execute(&self.host, probe.command()).await {
                Ok(output) if !output.is_empty() => *snapshot.field_mut(probe) = output,
                Ok(_) => debug!("{} on {} returned no output", probe.label(), self.host.host),
                Err(_) => {} // already reported by the executor
            }
        }
        snapshot.collected_at = OffsetDateTime::now_utc();
        snapshot
    }

    /// Polls until `shutdown` flips to true (or its sender goes away).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        debug!("monitoring server {} every {}s", self.host_id(), self.interval.as_secs());

        loop {
            let cycle = AssertUnwindSafe(self.poll_cycle()).catch_unwind();
            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                outcome = cycle => match outcome {
                    Ok(snapshot) => {
                        self.store.write(self.host_id(), snapshot);
                        debug!("updated data for server {}", self.host_id());
                    }
                    Err(panic) => {
                        error!(
                            "monitoring cycle for server {} failed: {}",
                            self.host_id(),
                            panic_message(panic.as_ref())
                        );
                    }
                },
            }

            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!("monitor for server {} stopped", self.host_id());
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // Err means the sender is gone, which is a stop request as well
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
