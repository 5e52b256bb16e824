use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::candidate::{Candidate, CandidateStatus};
use crate::models::message::{Message, MessageDirection};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastEvent {
    NewApplication(NewApplicationPayload),
    NewMessage(NewMessagePayload),
    StatusChange(StatusChangePayload),
    CandidateUpdate(Candidate),
    MessagesRead(MessagesReadPayload),
}

impl BroadcastEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BroadcastEvent::NewApplication(_) => EventKind::NewApplication,
            BroadcastEvent::NewMessage(_) => EventKind::NewMessage,
            BroadcastEvent::StatusChange(_) => EventKind::StatusChange,
            BroadcastEvent::CandidateUpdate(_) => EventKind::CandidateUpdate,
            BroadcastEvent::MessagesRead(_) => EventKind::MessagesRead,
        }
    }

    pub fn candidate_id(&self) -> Uuid {
        match self {
            BroadcastEvent::NewApplication(p) => p.candidate_id,
            BroadcastEvent::NewMessage(p) => p.candidate_id,
            BroadcastEvent::StatusChange(p) => p.candidate_id,
            BroadcastEvent::CandidateUpdate(c) => c.id,
            BroadcastEvent::MessagesRead(p) => p.candidate_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewApplicationPayload {
    pub candidate_id: Uuid,
    pub bot_id: Uuid,
    pub job_id: Uuid,
    /// Set once the survey is finished; absent when the application was just opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CandidateStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessagePayload {
    pub candidate_id: Uuid,
    pub message: Message,
    pub direction: MessageDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangePayload {
    pub candidate_id: Uuid,
    pub status: CandidateStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagesReadPayload {
    pub candidate_id: Uuid,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewApplication,
    NewMessage,
    StatusChange,
    CandidateUpdate,
    MessagesRead,
    Pong,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::NewApplication,
        EventKind::NewMessage,
        EventKind::StatusChange,
        EventKind::CandidateUpdate,
        EventKind::MessagesRead,
        EventKind::Pong,
    ];

    pub fn as_wire(&self) -> &'static str {
        match self {
            EventKind::NewApplication => "NEW_APPLICATION",
            EventKind::NewMessage => "NEW_MESSAGE",
            EventKind::StatusChange => "STATUS_CHANGE",
            EventKind::CandidateUpdate => "CANDIDATE_UPDATE",
            EventKind::MessagesRead => "MESSAGES_READ",
            EventKind::Pong => "PONG",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        EventKind::ALL.into_iter().find(|k| k.as_wire() == s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl WireFrame {
    pub fn ping() -> Self {
        Self {
            kind: "PING".to_string(),
            payload: None,
        }
    }

    pub fn pong() -> Self {
        Self {
            kind: "PONG".to_string(),
            payload: None,
        }
    }
}
