use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Photo,
    Document,
    Voice,
    Audio,
    Video,
}

impl MessageType {
    /// Picks the outbound type for an uploaded file from its MIME type.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            MessageType::Photo
        } else if mime.starts_with("video/") {
            MessageType::Video
        } else if mime.starts_with("audio/") {
            if mime.contains("ogg") {
                MessageType::Voice
            } else {
                MessageType::Audio
            }
        } else {
            MessageType::Document
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub operator_id: Option<Uuid>,
    pub direction: MessageDirection,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub text: Option<String>,
    pub file_ref: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub local_path: Option<String>,
    pub channel_message_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub candidate_id: Uuid,
    pub operator_id: Option<Uuid>,
    pub direction: MessageDirection,
    pub message_type: MessageType,
    pub text: Option<String>,
    pub file_ref: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub local_path: Option<String>,
    pub channel_message_id: Option<i64>,
}
