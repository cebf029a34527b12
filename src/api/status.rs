//! Status endpoint
//!
//! Reports liveness and the timing of the last monitoring cycle.

use axum::{extract::State, Json};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::services::MonitorState;
use crate::AppState;

/// Compiler the binary was built with (set by build.rs)
pub const RUST_VERSION: &str = env!("WM_MONITOR_RUSTC_VERSION");

/// Status response body
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub status: String,
    /// Seconds since startup
    pub uptime: f64,
    /// Seconds, `null` until the first cycle is reported
    pub last_cycle_duration: Option<f64>,
    pub last_cycle_start: Option<String>,
    pub timestamp: String,
    pub rust_version: String,
}

impl StatusResponse {
    pub fn build(monitor: &MonitorState, now: DateTime<Utc>) -> Self {
        let last_cycle = monitor.last_cycle();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "healthy".to_string(),
            uptime: monitor.uptime_at(now),
            last_cycle_duration: last_cycle.map(|c| c.duration.as_secs_f64()),
            last_cycle_start: last_cycle.map(|c| rfc3339(c.started_at)),
            timestamp: rfc3339(now),
            rust_version: RUST_VERSION.to_string(),
        }
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// GET /wm_resource_monitor/api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse::build(&state.monitor, Utc::now()))
}
