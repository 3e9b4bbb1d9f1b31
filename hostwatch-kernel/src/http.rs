/**
 * HOSTWATCH HTTP - Read-only presentation of the snapshot store
 *
 * ROLE:
 * Serves the latest snapshot of every host, as an HTML page for humans and as
 * JSON for scripts. Handlers only ever call `read_all()` / `get()` on the
 * store, so they can run at any time, including while monitors write.
 *
 * ROUTES:
 * - GET /               dashboard page (raw command output per host)
 * - GET /health         liveness probe
 * - GET /system/health  kernel counters
 * - GET /hosts          every host as JSON
 * - GET /hosts/{id}     one host as JSON
 */

use crate::health::{HealthTracker, KernelHealth};
use crate::models::{HostSnapshot, Probe, SnapshotMap};
use crate::reporter::FailureReporter;
use crate::state::SnapshotStore;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::{routing::get, Json, Router};
use std::fmt::Write as _;
use std::sync::Arc;
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};

/// Age after which a snapshot is flagged as stale
const STALE_AFTER_SECONDS: i64 = 60;

#[derive(Debug, serde::Serialize)]
pub struct HostView {
    host_id: String,
    collected_at: String,   // RFC3339
    age_seconds: i64,
    stale: bool,
    uptime: String,
    memory: String,
    cpu_usage: String,
    temperature: String,
}

fn to_view(host_id: &str, snap: &HostSnapshot) -> HostView {
    let age = OffsetDateTime::now_utc() - snap.collected_at;
    HostView {
        host_id: host_id.to_string(),
        collected_at: snap.collected_at.format(&Rfc3339).unwrap_or_default(),
        age_seconds: age.whole_seconds().max(0),
        stale: age > Duration::seconds(STALE_AFTER_SECONDS),
        uptime: snap.uptime.clone(),
        memory: snap.memory.clone(),
        cpu_usage: snap.cpu_usage.clone(),
        temperature: snap.temperature.clone(),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: SnapshotStore,
    pub health_tracker: HealthTracker,
    pub reporter: Arc<FailureReporter>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/hosts", get(get_hosts))
        .route("/hosts/{id}", get(get_host))
        .with_state(app_state)
}

// GET / (dashboard)
async fn index(State(app): State<AppState>) -> Html<String> {
    Html(render_index(&app.store.read_all()))
}

// GET /hosts (liste)
async fn get_hosts(State(app): State<AppState>) -> Json<Vec<HostView>> {
    let mut list: Vec<HostView> = app
        .store
        .read_all()
        .iter()
        .map(|(id, snap)| to_view(id, snap))
        .collect();
    list.sort_by(|a, b| a.host_id.cmp(&b.host_id));
    Json(list)
}

// GET /hosts/{id} (détail)
async fn get_host(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HostView>, StatusCode> {
    let Some(snap) = app.store.get(&id) else { return Err(StatusCode::NOT_FOUND); };
    Ok(Json(to_view(&id, &snap)))
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(&app.store, &app.reporter))
}

fn render_index(snapshots: &SnapshotMap) -> String {
    let mut ids: Vec<&String> = snapshots.keys().collect();
    ids.sort();

    let mut page = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"5\">\n<title>Server monitor</title>\n\
         <style>body{font-family:sans-serif;margin:2em}section{border:1px solid #ccc;\
         padding:1em;margin-bottom:1em}pre{background:#f6f6f6;padding:.5em;overflow-x:auto}</style>\n\
         </head>\n<body>\n<h1>Server monitor</h1>\n",
    );

    if ids.is_empty() {
        page.push_str("<p>No hosts reporting yet.</p>\n");
    }

    for id in ids {
        let snap = &snapshots[id];
        let view = to_view(id, snap);
        // writing into a String cannot fail
        let _ = write!(
            page,
            "<section>\n<h2>{}</h2>\n<p>updated {}{}</p>\n",
            escape_html(id),
            escape_html(&view.collected_at),
            if view.stale { " (stale)" } else { "" }
        );
        for probe in Probe::ALL {
            let _ = write!(
                page,
                "<h3>{}</h3>\n<pre>{}</pre>\n",
                probe.label(),
                escape_html(snap.field(probe))
            );
        }
        page.push_str("</section>\n");
    }

    page.push_str("</body>\n</html>\n");
    page
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
