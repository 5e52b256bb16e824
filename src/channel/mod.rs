pub mod telegram;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::message::MessageType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Document,
    Voice,
    Audio,
    Video,
}

impl MediaKind {
    pub fn default_file_name(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo.jpg",
            MediaKind::Document => "document",
            MediaKind::Voice => "voice.ogg",
            MediaKind::Audio => "audio.mp3",
            MediaKind::Video => "video.mp4",
        }
    }

    pub fn default_mime_type(&self) -> Option<&'static str> {
        match self {
            MediaKind::Photo => Some("image/jpeg"),
            MediaKind::Document => None,
            MediaKind::Voice => Some("audio/ogg"),
            MediaKind::Audio => Some("audio/mpeg"),
            MediaKind::Video => Some("video/mp4"),
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            MediaKind::Photo => MessageType::Photo,
            MediaKind::Document => MessageType::Document,
            MediaKind::Voice => MessageType::Voice,
            MediaKind::Audio => MessageType::Audio,
            MediaKind::Video => MessageType::Video,
        }
    }

    pub fn from_message_type(message_type: MessageType) -> Option<Self> {
        match message_type {
            MessageType::Text => None,
            MessageType::Photo => Some(MediaKind::Photo),
            MessageType::Document => Some(MediaKind::Document),
            MessageType::Voice => Some(MediaKind::Voice),
            MessageType::Audio => Some(MediaKind::Audio),
            MessageType::Video => Some(MediaKind::Video),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_ref: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

impl MediaRef {
    pub fn display_name(&self) -> String {
        self.file_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.kind.default_file_name().to_string())
    }

    pub fn mime_type(&self) -> Option<String> {
        self.mime_type
            .clone()
            .or_else(|| self.kind.default_mime_type().map(str::to_string))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUser {
    pub id: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    Start,
    Text(String),
    Media {
        media: MediaRef,
        caption: Option<String>,
    },
    Callback {
        id: String,
        data: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub bot_id: Uuid,
    pub chat_id: String,
    pub user: ChannelUser,
    pub message_id: Option<i64>,
    pub kind: InboundKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceButton {
    pub text: String,
    pub data: String,
}

/// Outbound side of the messaging channel. Every send returns the channel's message id.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<i64>;

    async fn send_choice(&self, chat_id: &str, text: &str, buttons: &[ChoiceButton]) -> Result<i64>;

    async fn send_media(
        &self,
        chat_id: &str,
        kind: MediaKind,
        path: &str,
        caption: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<i64>;

    async fn download_media(&self, file_ref: &str, suggested_name: &str) -> Result<String>;

    async fn answer_callback(&self, callback_id: &str) -> Result<()>;
}
