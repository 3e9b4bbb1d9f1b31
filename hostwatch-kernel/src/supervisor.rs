use crate::config::HostSource;
use crate::executor::RemoteExecutor;
use crate::monitor::{HostMonitor, POLL_INTERVAL};
use crate::state::SnapshotStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Starts one [`HostMonitor`] per configured host, all feeding the same store.
pub struct Supervisor {
    store: SnapshotStore,
    executor: Arc<dyn RemoteExecutor>,
    poll_interval: Duration,
}

impl Supervisor {
    pub fn new(store: SnapshotStore, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { store, executor, poll_interval: POLL_INTERVAL }
    }

    /// Loads the host list and spawns the monitors.
    ///
    /// A host list that cannot be loaded is logged and treated as empty:
    /// nothing gets monitored, but the caller keeps running.
    pub async fn start(&self, source: &dyn HostSource) -> MonitoringHandle {
        let hosts = match source.load().await {
            Ok(hosts) => hosts,
            Err(e) => {
                error!("failed to load servers: {}", e);
                Vec::new()
            }
        };

        let (shutdown, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();
        for host in hosts {
            let monitor = HostMonitor::new(host, self.executor.clone(), self.store.clone(), self.poll_interval);
            debug!("starting monitor for server {}", monitor.host_id());
            tasks.spawn(monitor.run(stop_rx.clone()));
        }

        info!("monitoring {} server(s)", tasks.len());
        MonitoringHandle { monitored: tasks.len(), shutdown, tasks }
    }
}

/// Running monitors plus the switch that stops them.
pub struct MonitoringHandle {
    monitored: usize,
    shutdown: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl MonitoringHandle {
    pub fn monitored_hosts(&self) -> usize {
        self.monitored
    }

    /// Waits until every monitor has ended. Monitors only end on shutdown,
    /// so with at least one host this never returns on its own.
    pub async fn wait(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!("monitor task crashed: {}", e);
                }
            }
        }
    }

    /// Stops all monitors, including those blocked on a remote command, and
    /// waits for them to finish.
    pub async fn shutdown(mut self) {
        // no receiver left just means every monitor already ended
        let _ = self.shutdown.send(true);
        self.wait().await;
        debug!("all monitors stopped");
    }
}
