use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "status": "ok",
        "bots": state.bots.running_bot_ids().len(),
        "connections": state.hub.connection_count(),
    });
    (StatusCode::OK, Json(body))
}
