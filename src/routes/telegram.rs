use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    channel::telegram::TelegramUpdate,
    error::{Error, Result},
    AppState,
};

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

fn secret_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|got| bool::from(got.as_bytes().ct_eq(expected.as_bytes())))
        .unwrap_or(false)
}

/// Channel ingress. Processing failures are logged and still acknowledged so
/// Telegram does not redeliver an update that can never succeed.
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(bot_id): Path<Uuid>,
    headers: HeaderMap,
    Json(update): Json<TelegramUpdate>,
) -> Result<impl IntoResponse> {
    if let Some(secret) = &state.config.webhook_secret {
        if !secret_matches(&headers, secret) {
            return Err(Error::Unauthorized("Invalid webhook secret".to_string()));
        }
    }
    if !state.bots.is_running(bot_id) {
        return Err(Error::not_found("Bot"));
    }

    let update_id = update.update_id;
    tracing::debug!(%bot_id, update_id, "telegram update received");
    if let Some(event) = update.into_event(bot_id) {
        if let Err(err) = state.dispatcher.handle(event).await {
            tracing::error!(%bot_id, update_id, error = %err, "failed to handle telegram update");
        }
    }

    Ok(StatusCode::OK)
}
