use std::path::{Path as StdPath, PathBuf};

use axum::{
    extract::{Extension, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tokio::fs;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::message_dto::{MarkReadResponse, SendMessagePayload, SendMessageResponse, UnreadResponse},
    error::{Error, Result},
    middleware::auth::Claims,
    models::message::MessageType,
    services::message_service::{OutboundMessage, SendOutcome},
    utils::token::random_suffix,
    AppState,
};

fn created(outcome: SendOutcome) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: outcome.message,
            delivered: outcome.delivered,
        }),
    )
}

#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.message_service.list(candidate_id).await?))
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(candidate_id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let message_type = payload.message_type.unwrap_or(MessageType::Text);
    if message_type != MessageType::Text {
        return Err(Error::BadRequest(
            "Media messages must be sent through the media endpoint".to_string(),
        ));
    }
    let text = payload
        .text
        .ok_or_else(|| Error::BadRequest("Text is required for text messages".to_string()))?;

    let outcome = state
        .message_service
        .send_outbound(candidate_id, claims.operator_id()?, OutboundMessage::text(text))
        .await?;
    Ok(created(outcome))
}

/// Multipart form: `file` (required) and `caption` (optional).
#[axum::debug_handler]
pub async fn send_media(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(candidate_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut caption = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or_default() {
            "caption" => {
                let text = field.text().await?;
                if !text.trim().is_empty() {
                    caption = Some(text);
                }
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("file.bin").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?;
                if !data.is_empty() {
                    upload = Some((file_name, mime_type, data));
                }
            }
            _ => {}
        }
    }

    let (file_name, mime_type, data) =
        upload.ok_or_else(|| Error::BadRequest("No file provided".to_string()))?;
    let local_path = save_upload(&state.config.upload_dir, &file_name, &data).await?;

    let outbound = OutboundMessage {
        message_type: MessageType::from_mime(&mime_type),
        text: caption,
        local_path: Some(local_path),
        file_name: Some(file_name),
        mime_type: Some(mime_type),
    };
    let outcome = state
        .message_service
        .send_outbound(candidate_id, claims.operator_id()?, outbound)
        .await?;
    Ok(created(outcome))
}

async fn save_upload(upload_dir: &str, file_name: &str, data: &[u8]) -> Result<String> {
    let dir = PathBuf::from(upload_dir).join("messages");
    fs::create_dir_all(&dir).await?;

    let ext = StdPath::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();
    let path = dir.join(format!(
        "{}_{}{}",
        chrono::Utc::now().timestamp_millis(),
        random_suffix(8),
        ext
    ));
    fs::write(&path, data).await.map_err(|e| {
        tracing::error!(error = %e, "failed to write uploaded file");
        Error::Io(e)
    })?;
    Ok(path.to_string_lossy().into_owned())
}

#[axum::debug_handler]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let updated = state.message_service.mark_read(candidate_id).await?;
    Ok(Json(MarkReadResponse { updated }))
}

#[axum::debug_handler]
pub async fn unread_total(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let unread_count = state.message_service.unread_total().await?;
    Ok(Json(UnreadResponse { unread_count }))
}
