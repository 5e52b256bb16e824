use std::sync::Arc;

use uuid::Uuid;

use crate::channel::{MediaKind, MediaRef};
use crate::error::{Error, Result};
use crate::models::candidate::{Candidate, CandidateStatus};
use crate::models::event::{BroadcastEvent, MessagesReadPayload, NewMessagePayload};
use crate::models::message::{Message, MessageDirection, MessageType, NewMessage};
use crate::repository::Repository;
use crate::services::bot_registry::BotRegistry;
use crate::services::broadcast_hub::BroadcastHub;

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub message_type: MessageType,
    pub text: Option<String>,
    pub local_path: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message_type: MessageType::Text,
            text: Some(text.into()),
            local_path: None,
            file_name: None,
            mime_type: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message: Message,
    /// `false` when the channel rejected the send or the bot is not running.
    pub delivered: bool,
}

#[derive(Clone)]
pub struct MessageService {
    repo: Arc<dyn Repository>,
    hub: Arc<BroadcastHub>,
    bots: Arc<BotRegistry>,
}

impl MessageService {
    pub fn new(repo: Arc<dyn Repository>, hub: Arc<BroadcastHub>, bots: Arc<BotRegistry>) -> Self {
        Self { repo, hub, bots }
    }

    pub async fn record_inbound(
        &self,
        candidate: &Candidate,
        channel_message_id: Option<i64>,
        text: Option<String>,
        media: Option<&MediaRef>,
    ) -> Result<Message> {
        let (message_type, file_ref, file_name, mime_type, local_path) = match media {
            Some(media) => {
                let name = media.display_name();
                let local_path = self.download(candidate, media, &name).await;
                (
                    media.kind.message_type(),
                    Some(media.file_ref.clone()),
                    Some(name),
                    media.mime_type(),
                    local_path,
                )
            }
            None => (MessageType::Text, None, None, None, None),
        };

        let message = self
            .repo
            .insert_message(NewMessage {
                candidate_id: candidate.id,
                operator_id: None,
                direction: MessageDirection::Inbound,
                message_type,
                text,
                file_ref,
                file_name,
                mime_type,
                local_path,
                channel_message_id,
            })
            .await?;
        self.repo.touch_candidate(candidate.id).await?;

        let unread = self.repo.unread_count(candidate.id).await?;
        tracing::debug!(candidate_id = %candidate.id, message_id = %message.id, unread, "inbound message stored");
        self.hub
            .broadcast(&BroadcastEvent::NewMessage(NewMessagePayload {
                candidate_id: candidate.id,
                message: message.clone(),
                direction: MessageDirection::Inbound,
                unread_count: Some(unread),
            }));
        Ok(message)
    }

    async fn download(&self, candidate: &Candidate, media: &MediaRef, name: &str) -> Option<String> {
        let transport = self.bots.transport(candidate.bot_id)?;
        match transport.download_media(&media.file_ref, name).await {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!(candidate_id = %candidate.id, error = %err, "inbound media download failed");
                None
            }
        }
    }

    /// Sends an operator message. The message is stored and broadcast even when
    /// delivery fails; the outcome says whether the channel accepted it.
    pub async fn send_outbound(
        &self,
        candidate_id: Uuid,
        operator_id: Uuid,
        outbound: OutboundMessage,
    ) -> Result<SendOutcome> {
        let candidate = self
            .repo
            .get_candidate(candidate_id)
            .await?
            .ok_or_else(|| Error::not_found("Candidate"))?;
        if candidate.status == CandidateStatus::Incomplete {
            return Err(Error::BadRequest(
                "Cannot message a candidate who has not finished the survey".to_string(),
            ));
        }
        let media_kind = MediaKind::from_message_type(outbound.message_type);
        match (media_kind, &outbound.local_path, &outbound.text) {
            (None, _, Some(text)) if !text.trim().is_empty() => {}
            (None, _, _) => {
                return Err(Error::BadRequest("Text is required for text messages".to_string()))
            }
            (Some(_), None, _) => {
                return Err(Error::BadRequest("A file is required for media messages".to_string()))
            }
            (Some(_), Some(_), _) => {}
        }

        let channel_message_id = self.deliver(&candidate, media_kind, &outbound).await;
        let delivered = channel_message_id.is_some();

        let message = self
            .repo
            .insert_message(NewMessage {
                candidate_id,
                operator_id: Some(operator_id),
                direction: MessageDirection::Outbound,
                message_type: outbound.message_type,
                text: outbound.text,
                file_ref: None,
                file_name: outbound.file_name,
                mime_type: outbound.mime_type,
                local_path: outbound.local_path,
                channel_message_id,
            })
            .await?;
        self.repo.touch_candidate(candidate_id).await?;

        tracing::info!(%candidate_id, %operator_id, delivered, "outbound message stored");
        self.hub
            .broadcast(&BroadcastEvent::NewMessage(NewMessagePayload {
                candidate_id,
                message: message.clone(),
                direction: MessageDirection::Outbound,
                unread_count: None,
            }));
        Ok(SendOutcome { message, delivered })
    }

    async fn deliver(
        &self,
        candidate: &Candidate,
        media_kind: Option<MediaKind>,
        outbound: &OutboundMessage,
    ) -> Option<i64> {
        let Some(transport) = self.bots.transport(candidate.bot_id) else {
            tracing::warn!(bot_id = %candidate.bot_id, "bot is not running, message not delivered");
            return None;
        };
        let chat_id = candidate.channel_user_id.as_str();

        let sent = match (media_kind, outbound.local_path.as_deref()) {
            (Some(kind), Some(path)) => {
                transport
                    .send_media(
                        chat_id,
                        kind,
                        path,
                        outbound.text.as_deref(),
                        outbound.file_name.as_deref(),
                    )
                    .await
            }
            _ => {
                transport
                    .send_text(chat_id, outbound.text.as_deref().unwrap_or_default())
                    .await
            }
        };

        match sent {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(candidate_id = %candidate.id, error = %err, "outbound delivery failed");
                None
            }
        }
    }

    pub async fn list(&self, candidate_id: Uuid) -> Result<Vec<Message>> {
        self.repo.list_messages(candidate_id).await
    }

    pub async fn mark_read(&self, candidate_id: Uuid) -> Result<u64> {
        if self.repo.get_candidate(candidate_id).await?.is_none() {
            return Err(Error::not_found("Candidate"));
        }
        let updated = self.repo.mark_messages_read(candidate_id).await?;
        self.hub
            .broadcast(&BroadcastEvent::MessagesRead(MessagesReadPayload {
                candidate_id,
                unread_count: 0,
            }));
        Ok(updated)
    }

    pub async fn unread_total(&self) -> Result<i64> {
        self.repo.total_unread_count().await
    }
}
