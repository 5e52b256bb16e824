use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{ChannelTransport, ChannelUser, ChoiceButton, InboundEvent, InboundKind, MediaKind, MediaRef};
use crate::error::{Error, Result};
use crate::utils::token::random_suffix;

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photo: Option<Vec<TelegramPhotoSize>>,
    pub document: Option<TelegramFile>,
    pub voice: Option<TelegramFile>,
    pub audio: Option<TelegramFile>,
    pub video: Option<TelegramFile>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramPhotoSize {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TelegramFile {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramCallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    pub message: Option<TelegramMessage>,
    pub data: Option<String>,
}

impl TelegramUpdate {
    /// Normalizes an update into a channel-neutral event. Updates the bot does not
    /// react to (edits, stickers, service messages) yield `None`.
    pub fn into_event(self, bot_id: Uuid) -> Option<InboundEvent> {
        if let Some(cb) = self.callback_query {
            let chat_id = cb
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(cb.from.id);
            return Some(InboundEvent {
                bot_id,
                chat_id: chat_id.to_string(),
                user: ChannelUser {
                    id: cb.from.id.to_string(),
                    username: cb.from.username,
                },
                message_id: None,
                kind: InboundKind::Callback {
                    id: cb.id,
                    data: cb.data.unwrap_or_default(),
                },
            });
        }

        let message = self.message?;
        let from = message.from.as_ref()?;
        let user = ChannelUser {
            id: from.id.to_string(),
            username: from.username.clone(),
        };
        let kind = message_kind(&message)?;

        Some(InboundEvent {
            bot_id,
            chat_id: message.chat.id.to_string(),
            user,
            message_id: Some(message.message_id),
            kind,
        })
    }
}

fn message_kind(message: &TelegramMessage) -> Option<InboundKind> {
    if let Some(text) = &message.text {
        if text.trim_start().starts_with("/start") {
            return Some(InboundKind::Start);
        }
        return Some(InboundKind::Text(text.clone()));
    }

    let media = if let Some(sizes) = &message.photo {
        // Telegram lists sizes smallest first.
        sizes.last().map(|p| MediaRef {
            kind: MediaKind::Photo,
            file_ref: p.file_id.clone(),
            file_name: None,
            mime_type: None,
        })
    } else if let Some(f) = &message.document {
        Some(file_ref(MediaKind::Document, f))
    } else if let Some(f) = &message.voice {
        Some(file_ref(MediaKind::Voice, f))
    } else if let Some(f) = &message.audio {
        Some(file_ref(MediaKind::Audio, f))
    } else {
        message.video.as_ref().map(|f| file_ref(MediaKind::Video, f))
    }?;

    Some(InboundKind::Media {
        media,
        caption: message.caption.clone(),
    })
}

fn file_ref(kind: MediaKind, f: &TelegramFile) -> MediaRef {
    MediaRef {
        kind,
        file_ref: f.file_id.clone(),
        file_name: f.file_name.clone(),
        mime_type: f.mime_type.clone(),
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<Value>,
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramTransport {
    client: reqwest::Client,
    api_base: String,
    token: String,
    bot_id: Uuid,
    upload_dir: PathBuf,
}

impl TelegramTransport {
    pub fn new(
        client: reqwest::Client,
        api_base: &str,
        token: &str,
        bot_id: Uuid,
        upload_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            bot_id,
            upload_dir: upload_dir.as_ref().to_path_buf(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{} request failed: {}", method, e)))?;
        unwrap_response(method, response).await
    }

    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<()> {
        let mut body = json!({ "url": url, "allowed_updates": ["message", "callback_query"] });
        if let Some(secret) = secret {
            body["secret_token"] = json!(secret);
        }
        self.call("setWebhook", body).await?;
        tracing::info!(bot_id = %self.bot_id, url, "telegram webhook registered");
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<()> {
        self.call("deleteWebhook", json!({})).await?;
        Ok(())
    }
}

async fn unwrap_response(method: &str, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let parsed: ApiResponse = response
        .json()
        .await
        .map_err(|e| Error::Transport(format!("{} returned {}: {}", method, status, e)))?;
    if !parsed.ok {
        return Err(Error::Transport(format!(
            "{} failed: {}",
            method,
            parsed.description.unwrap_or_else(|| status.to_string())
        )));
    }
    Ok(parsed.result.unwrap_or(Value::Null))
}

fn message_id(method: &str, result: &Value) -> Result<i64> {
    result
        .get("message_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::Transport(format!("{} response has no message_id", method)))
}

fn media_method(kind: MediaKind) -> (&'static str, &'static str) {
    match kind {
        MediaKind::Photo => ("sendPhoto", "photo"),
        MediaKind::Document => ("sendDocument", "document"),
        MediaKind::Voice => ("sendVoice", "voice"),
        MediaKind::Audio => ("sendAudio", "audio"),
        MediaKind::Video => ("sendVideo", "video"),
    }
}

#[async_trait]
impl ChannelTransport for TelegramTransport {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<i64> {
        let result = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        message_id("sendMessage", &result)
    }

    async fn send_choice(&self, chat_id: &str, text: &str, buttons: &[ChoiceButton]) -> Result<i64> {
        let keyboard: Vec<Value> = buttons
            .iter()
            .map(|b| json!([{ "text": b.text, "callback_data": b.data }]))
            .collect();
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": { "inline_keyboard": keyboard },
        });
        let result = self.call("sendMessage", body).await?;
        message_id("sendMessage", &result)
    }

    async fn send_media(
        &self,
        chat_id: &str,
        kind: MediaKind,
        path: &str,
        caption: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<i64> {
        let (method, field) = media_method(kind);
        let bytes = tokio::fs::read(path).await?;
        let file_name = display_name
            .map(str::to_string)
            .or_else(|| {
                Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| kind.default_file_name().to_string());

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part(field, Part::bytes(bytes).file_name(file_name));
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            form = form.text("caption", caption.to_string());
        }

        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{} request failed: {}", method, e)))?;
        let result = unwrap_response(method, response).await?;
        message_id(method, &result)
    }

    async fn download_media(&self, file_ref: &str, suggested_name: &str) -> Result<String> {
        let info = self.call("getFile", json!({ "file_id": file_ref })).await?;
        let remote_path = info
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Transport("getFile response has no file_path".to_string()))?;

        let url = format!("{}/file/bot{}/{}", self.api_base, self.token, remote_path);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("file download failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "file download returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("file download failed: {}", e)))?;

        let ext = Path::new(remote_path)
            .extension()
            .or_else(|| Path::new(suggested_name).extension())
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let dir = self.upload_dir.join(self.bot_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        let target = dir.join(format!(
            "{}_{}{}",
            chrono::Utc::now().timestamp_millis(),
            random_suffix(8),
            ext
        ));
        tokio::fs::write(&target, &bytes).await?;

        tracing::debug!(bot_id = %self.bot_id, path = %target.display(), "media downloaded");
        Ok(target.to_string_lossy().into_owned())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        self.call(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_id }),
        )
        .await?;
        Ok(())
    }
}
