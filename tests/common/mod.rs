#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use hirebot_backend::{
    channel::{ChannelTransport, ChannelUser, ChoiceButton, MediaKind},
    config::Config,
    error::{Error, Result},
    models::{
        candidate::{Candidate, CandidateStatus},
        column::{NewColumn, PipelineColumn},
        event::BroadcastEvent,
        job::{Bot, Job},
        operator::Operator,
        question::{Question, QuestionOption, QuestionType, Translation},
    },
    repository::{MemoryRepository, Repository},
    services::{
        bot_registry::BotRegistry, broadcast_hub::OutboundFrame, survey_service::Submission,
    },
    utils::crypto::hash_password,
    AppState,
};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key";
pub const OPERATOR_EMAIL: &str = "hr@example.com";
pub const OPERATOR_PASSWORD: &str = "s3cret-pass";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat_id: String,
        text: String,
    },
    Choice {
        chat_id: String,
        text: String,
        buttons: Vec<ChoiceButton>,
    },
    Media {
        chat_id: String,
        kind: MediaKind,
        path: String,
        caption: Option<String>,
    },
}

impl Sent {
    pub fn text(&self) -> &str {
        match self {
            Sent::Text { text, .. } | Sent::Choice { text, .. } => text,
            Sent::Media { caption, .. } => caption.as_deref().unwrap_or_default(),
        }
    }
}

/// Channel transport that records every send instead of talking to Telegram.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    downloads: Mutex<Vec<String>>,
    fail_sends: AtomicBool,
    fail_downloads: AtomicBool,
    next_id: AtomicI64,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn take_sent(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn last(&self) -> Option<Sent> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    fn record(&self, sent: Sent) -> Result<i64> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Transport("Forbidden: bot was blocked by the user".into()));
        }
        self.sent.lock().unwrap().push(sent);
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl ChannelTransport for RecordingTransport {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<i64> {
        self.record(Sent::Text {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
        })
    }

    async fn send_choice(&self, chat_id: &str, text: &str, buttons: &[ChoiceButton]) -> Result<i64> {
        self.record(Sent::Choice {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            buttons: buttons.to_vec(),
        })
    }

    async fn send_media(
        &self,
        chat_id: &str,
        kind: MediaKind,
        path: &str,
        caption: Option<&str>,
        _display_name: Option<&str>,
    ) -> Result<i64> {
        self.record(Sent::Media {
            chat_id: chat_id.to_string(),
            kind,
            path: path.to_string(),
            caption: caption.map(str::to_string),
        })
    }

    async fn download_media(&self, file_ref: &str, suggested_name: &str) -> Result<String> {
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(Error::Transport("file is too big".into()));
        }
        self.downloads.lock().unwrap().push(file_ref.to_string());
        Ok(format!("/uploads/test/{}_{}", file_ref, suggested_name))
    }

    async fn answer_callback(&self, _callback_id: &str) -> Result<()> {
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub repo: Arc<MemoryRepository>,
    pub transport: Arc<RecordingTransport>,
    pub bot: Bot,
    pub upload_dir: TempDir,
}

impl TestApp {
    /// A bot offering English and Russian with `en` as default, already running.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let upload_dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::local(JWT_SECRET, upload_dir.path().to_str().expect("utf-8 path"));
        tweak(&mut config);

        let repo = Arc::new(MemoryRepository::new());
        let bot = repo
            .add_bot("Hiring bot", "123:abc", "en", &[("en", "English"), ("ru", "Русский")])
            .await;
        let transport = RecordingTransport::new();
        let bots = Arc::new(BotRegistry::new());
        bots.register(bot.id, transport.clone());

        let state = AppState::new(config, repo.clone(), bots);
        Self {
            state,
            repo,
            transport,
            bot,
            upload_dir,
        }
    }

    pub fn router(&self) -> Router {
        hirebot_backend::routes::app(self.state.clone())
    }

    pub async fn add_job(&self, title: &str) -> Job {
        self.repo.add_job(self.bot.id, &[("en", title)]).await
    }

    pub async fn add_question(&self, job: &Job, order: i32, spec: QuestionSpec) -> Question {
        let id = Uuid::new_v4();
        let options = spec
            .options
            .iter()
            .enumerate()
            .map(|(i, text)| QuestionOption {
                id: Uuid::new_v4(),
                question_id: id,
                order: i as i32,
                translations: if spec.bare_options {
                    Vec::new()
                } else {
                    vec![Translation::new("en", text)]
                },
            })
            .collect();
        self.repo
            .add_question(Question {
                id,
                bot_id: self.bot.id,
                job_id: Some(job.id),
                question_type: spec.question_type,
                order,
                field_key: spec.field_key.map(str::to_string),
                is_active: true,
                translations: spec
                    .translations
                    .iter()
                    .map(|(lang, text)| Translation::new(lang, text))
                    .collect(),
                options,
            })
            .await
    }

    /// Job "Engineer": Name (text, fullName), Experience level (Junior/Senior), Resume (file).
    pub async fn engineer_job(&self) -> EngineerJob {
        let job = self.add_job("Engineer").await;
        let name = self
            .add_question(&job, 0, QuestionSpec::text("Name").field("fullName"))
            .await;
        let level = self
            .add_question(
                &job,
                1,
                QuestionSpec::choice("Experience level", &["Junior", "Senior"]),
            )
            .await;
        let resume = self
            .add_question(&job, 2, QuestionSpec::attachment("Resume"))
            .await;
        EngineerJob {
            job,
            name,
            level,
            resume,
        }
    }

    pub fn user(&self, id: &str) -> ChannelUser {
        ChannelUser {
            id: id.to_string(),
            username: Some(format!("user{}", id)),
        }
    }

    /// Runs `user_id` through a text-only job until the survey is done.
    pub async fn active_candidate(&self, job: &Job, user_id: &str) -> Candidate {
        let survey = &self.state.survey_service;
        let mut out = survey
            .start_or_resume(self.bot.id, job.id, &self.user(user_id), "en")
            .await
            .unwrap();
        let mut message_id = 0;
        while out.candidate.status == CandidateStatus::Incomplete {
            message_id += 1;
            out = survey
                .submit_answer(out.candidate.id, Submission::text(Some(message_id), "answer"))
                .await
                .unwrap();
        }
        out.candidate
    }

    pub async fn column(&self, name: &str) -> PipelineColumn {
        self.state
            .pipeline_service
            .create_column(NewColumn {
                name: name.to_string(),
                color: "bg-slate-50".to_string(),
                dot: "bg-slate-400".to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn operator(&self) -> Operator {
        if let Some(existing) = self.repo.find_operator_by_email(OPERATOR_EMAIL).await.unwrap() {
            return existing;
        }
        let hash = hash_password(OPERATOR_PASSWORD).unwrap();
        self.repo
            .insert_operator(OPERATOR_EMAIL, "HR", &hash, "admin")
            .await
            .unwrap()
    }

    pub async fn token(&self) -> String {
        let operator = self.operator().await;
        hirebot_backend::middleware::auth::issue_token(&operator, JWT_SECRET).unwrap()
    }

    /// Registers a fake operator socket on the hub and returns its queue.
    pub fn listen(&self) -> UnboundedReceiver<OutboundFrame> {
        self.state.hub.register(Uuid::new_v4()).1
    }
}

pub struct EngineerJob {
    pub job: Job,
    pub name: Question,
    pub level: Question,
    pub resume: Question,
}

impl EngineerJob {
    pub fn option(&self, text: &str) -> Uuid {
        self.level
            .options
            .iter()
            .find(|o| o.translations.iter().any(|t| t.text == text))
            .map(|o| o.id)
            .expect("option exists")
    }
}

pub struct QuestionSpec {
    pub question_type: QuestionType,
    pub translations: Vec<(&'static str, &'static str)>,
    pub options: Vec<&'static str>,
    pub field_key: Option<&'static str>,
    pub bare_options: bool,
}

impl QuestionSpec {
    pub fn text(text: &'static str) -> Self {
        Self {
            question_type: QuestionType::Text,
            translations: vec![("en", text)],
            options: Vec::new(),
            field_key: None,
            bare_options: false,
        }
    }

    pub fn choice(text: &'static str, options: &[&'static str]) -> Self {
        Self {
            question_type: QuestionType::Choice,
            translations: vec![("en", text)],
            options: options.to_vec(),
            field_key: None,
            bare_options: false,
        }
    }

    pub fn attachment(text: &'static str) -> Self {
        Self {
            question_type: QuestionType::Attachment,
            translations: vec![("en", text)],
            options: Vec::new(),
            field_key: None,
            bare_options: false,
        }
    }

    pub fn untranslated(question_type: QuestionType) -> Self {
        Self {
            question_type,
            translations: Vec::new(),
            options: Vec::new(),
            field_key: None,
            bare_options: false,
        }
    }

    pub fn field(mut self, key: &'static str) -> Self {
        self.field_key = Some(key);
        self
    }

    /// Options are stored without any translation.
    pub fn bare_options(mut self) -> Self {
        self.bare_options = true;
        self
    }
}

/// Drains the decoded broadcast events currently queued for a listener.
pub fn drain_events(rx: &mut UnboundedReceiver<OutboundFrame>) -> Vec<BroadcastEvent> {
    let mut events = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        if let OutboundFrame::Text(text) = frame {
            if let Ok(event) = serde_json::from_str::<BroadcastEvent>(&text) {
                events.push(event);
            }
        }
    }
    events
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("request");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
