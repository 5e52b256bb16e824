use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::message::{Message, MessageType};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessagePayload {
    #[validate(length(min = 1, max = 4096))]
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub message_type: Option<MessageType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageResponse {
    #[serde(flatten)]
    pub message: Message,
    pub delivered: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadResponse {
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}
