//! First Blood monitor API handlers.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use ctfdesk_core::SchedulerStatus;

use crate::state::AppState;

/// Monitor status response
#[derive(Debug, Serialize)]
pub struct MonitorStatusResponse {
    /// Whether CTFd is configured and a monitor exists
    pub available: bool,
    #[serde(flatten)]
    pub status: SchedulerStatus,
}

/// Get First Blood monitor status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<MonitorStatusResponse> {
    match state.scheduler() {
        Some(scheduler) => Json(MonitorStatusResponse {
            available: true,
            status: scheduler.status().await,
        }),
        None => Json(MonitorStatusResponse {
            available: false,
            status: SchedulerStatus::default(),
        }),
    }
}
