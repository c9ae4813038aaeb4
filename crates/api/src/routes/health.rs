use crate::server::AppState;
use crate::types::HealthResponse;
use axum::{extract::State, Json};
use chrono::Utc;

/// Liveness plus the current worker-pool load
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: Some(format!(
            "{} workflows queued or running",
            state.service.in_flight()
        )),
        timestamp: Utc::now(),
    })
}
