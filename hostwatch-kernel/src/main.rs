/**
 * HOSTWATCH KERNEL - Point d'entrée principal
 *
 * ROLE: wires settings, logging, the SSH poller and the web page together.
 * One monitor task per configured server polls uptime / memory / CPU /
 * temperature every 5 seconds into a shared snapshot store; the HTTP layer
 * only reads that store.
 *
 * A broken server list or a web server that cannot bind never stops the
 * process: monitoring (possibly of zero hosts) keeps running until Ctrl-C.
 */

mod config;
mod executor;
mod health;
mod http;
mod logging;
mod models;
mod monitor;
mod reporter;
mod state;
mod supervisor;
#[cfg(test)]
mod testing;

use crate::config::{FileHostSource, Settings};
use crate::executor::SshExecutor;
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::reporter::FailureReporter;
use crate::state::SnapshotStore;
use crate::supervisor::Supervisor;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    let settings = Settings::from_env().context("invalid configuration")?;
    // flushes the log file on exit
    let _log_guard = logging::init(settings.log_file.as_deref())?;

    let store = SnapshotStore::new();
    let reporter = Arc::new(FailureReporter::default());
    let executor = Arc::new(
        SshExecutor::new(reporter.clone())
            .with_connect_timeout(settings.connect_timeout)
            .with_command_timeout(settings.command_timeout)
            .with_ssh_program(&settings.ssh_program)
            .with_sshpass_program(&settings.sshpass_program),
    );

    let supervisor = Supervisor::new(store.clone(), executor);
    let monitoring = supervisor
        .start(&FileHostSource::new(settings.servers_path()))
        .await;

    let app_state = AppState {
        store,
        health_tracker: HealthTracker::new(monitoring.monitored_hosts()),
        reporter,
    };
    let app = http::build_router(app_state);

    let addr = settings.listen_addr;
    let server = tokio::spawn(async move {
        if let Err(e) = serve(addr, app).await {
            error!("web server stopped: {:#}", e);
        }
    });

    tokio::signal::ctrl_c().await.context("cannot listen for Ctrl-C")?;
    info!("shutdown requested");

    monitoring.shutdown().await;
    server.abort();
    Ok(())
}

async fn serve(addr: SocketAddr, app: axum::Router) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("service available at http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
