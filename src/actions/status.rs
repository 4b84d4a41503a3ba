//! Status endpoint for version, uptime and relay settings

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;

use super::DataResponse;
use crate::web::AppState;

static SERVER_START_TIME: OnceLock<Instant> = OnceLock::new();

/// Record the server start time (call this when the server starts)
pub fn init_server_start_time() {
    SERVER_START_TIME.get_or_init(Instant::now);
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub uptime_human: String,
    /// Delay between upstream polls of each open stream
    pub refresh_interval_seconds: u64,
    pub upstream: String,
}

fn format_duration(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    match (days, hours, minutes) {
        (0, 0, 0) => format!("{}s", secs),
        (0, 0, _) => format!("{}m {}s", minutes, secs),
        (0, _, _) => format!("{}h {}m {}s", hours, minutes, secs),
        _ => format!("{}d {}h {}m {}s", days, hours, minutes, secs),
    }
}

/// Handler for GET /status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let uptime_seconds = SERVER_START_TIME
        .get_or_init(Instant::now)
        .elapsed()
        .as_secs();

    let status = StatusInfo {
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
        uptime_human: format_duration(uptime_seconds),
        refresh_interval_seconds: state.refresh_interval.as_secs(),
        upstream: state.source.describe(),
    };

    (StatusCode::OK, Json(DataResponse { data: status }))
}
