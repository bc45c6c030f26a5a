//! Health endpoint.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use super::AppState;

/// Returns liveness and uptime as JSON. Always 200.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}
