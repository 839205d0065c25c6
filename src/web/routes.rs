//! HTTP routes

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::{DashboardSnapshot, DashboardState};

/// API: latest dashboard view plus any pending notice
pub async fn api_dashboard(State(state): State<Arc<DashboardState>>) -> Json<DashboardSnapshot> {
    Json(state.snapshot())
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
