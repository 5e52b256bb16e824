use std::sync::Arc;

use uuid::Uuid;

use crate::channel::{ChannelTransport, ChoiceButton, InboundEvent, InboundKind};
use crate::error::Result;
use crate::models::candidate::{Candidate, CandidateStatus};
use crate::models::job::Bot;
use crate::models::question::QuestionType;
use crate::repository::Repository;
use crate::services::bot_registry::BotRegistry;
use crate::services::message_service::MessageService;
use crate::services::survey_service::{
    is_redelivery, NextStep, Prompt, RejectReason, Submission, SubmissionPayload, SurveyReply,
    SurveyService,
};
use crate::utils::i18n::{bot_text, BotText};

/// Button payloads: `lang:<code>`, `job:<job id>:<code>`, `ans:<option id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Callback {
    Lang(String),
    Job { job_id: Uuid, lang: String },
    Answer(Uuid),
}

fn parse_callback(data: &str) -> Option<Callback> {
    let (kind, rest) = data.split_once(':')?;
    match kind {
        "lang" if !rest.is_empty() => Some(Callback::Lang(rest.to_string())),
        "job" => {
            let (job_id, lang) = rest.split_once(':')?;
            Some(Callback::Job {
                job_id: job_id.parse().ok()?,
                lang: lang.to_string(),
            })
        }
        "ans" => rest.parse().ok().map(Callback::Answer),
        _ => None,
    }
}

pub fn prompt_text(prompt: &Prompt) -> String {
    format!("({}/{}) {}", prompt.number, prompt.total, prompt.text)
}

fn reject_text(lang: &str, reason: RejectReason) -> &'static str {
    let key = match reason {
        RejectReason::ChooseOption => BotText::ChooseOption,
        RejectReason::InvalidOption => BotText::InvalidOption,
        RejectReason::TypeAnswer => BotText::TypeAnswer,
        RejectReason::SendFile => BotText::SendFile,
    };
    bot_text(lang, key)
}

#[derive(Clone)]
pub struct BotDispatcher {
    repo: Arc<dyn Repository>,
    bots: Arc<BotRegistry>,
    survey: SurveyService,
    relay: MessageService,
}

impl BotDispatcher {
    pub fn new(
        repo: Arc<dyn Repository>,
        bots: Arc<BotRegistry>,
        survey: SurveyService,
        relay: MessageService,
    ) -> Self {
        Self {
            repo,
            bots,
            survey,
            relay,
        }
    }

    pub async fn handle(&self, event: InboundEvent) -> Result<()> {
        let Some(bot) = self.repo.get_bot(event.bot_id).await?.filter(|b| b.is_active) else {
            tracing::debug!(bot_id = %event.bot_id, "update for unknown or inactive bot dropped");
            return Ok(());
        };
        let Some(transport) = self.bots.transport(bot.id) else {
            tracing::warn!(bot_id = %bot.id, "update for a bot that is not running dropped");
            return Ok(());
        };
        let ctx = Conversation {
            transport: transport.as_ref(),
            chat_id: &event.chat_id,
        };

        match &event.kind {
            InboundKind::Start => self.on_start(&bot, &ctx).await,
            InboundKind::Callback { id, data } => {
                if let Err(err) = transport.answer_callback(id).await {
                    tracing::warn!(error = %err, "failed to acknowledge callback");
                }
                self.on_callback(&bot, &event, &ctx, data).await
            }
            InboundKind::Text(text) => {
                let submission = Submission::text(event.message_id, text.clone());
                self.on_message(&bot, &event, &ctx, submission, Some(text.clone()))
                    .await
            }
            InboundKind::Media { media, caption } => {
                let submission = Submission::media(event.message_id, media.clone());
                self.on_message(&bot, &event, &ctx, submission, caption.clone())
                    .await
            }
        }
    }

    async fn on_start(&self, bot: &Bot, ctx: &Conversation<'_>) -> Result<()> {
        let languages = self.repo.list_bot_languages(bot.id).await?;
        match languages.as_slice() {
            [] => self.show_jobs(bot, ctx, &bot.default_lang).await,
            [only] => self.show_jobs(bot, ctx, &only.code).await,
            many => {
                let buttons: Vec<ChoiceButton> = many
                    .iter()
                    .map(|l| ChoiceButton {
                        text: l.name.clone(),
                        data: format!("lang:{}", l.code),
                    })
                    .collect();
                ctx.buttons(bot_text(&bot.default_lang, BotText::Welcome), &buttons)
                    .await;
                Ok(())
            }
        }
    }

    async fn show_jobs(&self, bot: &Bot, ctx: &Conversation<'_>, lang: &str) -> Result<()> {
        let jobs = self.repo.list_active_jobs(bot.id).await?;
        let buttons: Vec<ChoiceButton> = jobs
            .iter()
            .filter_map(|job| {
                job.title(lang, &bot.default_lang).map(|title| ChoiceButton {
                    text: title.to_string(),
                    data: format!("job:{}:{}", job.id, lang),
                })
            })
            .collect();

        if buttons.is_empty() {
            ctx.text(bot_text(lang, BotText::NoJobs)).await;
        } else {
            ctx.buttons(bot_text(lang, BotText::ChooseJob), &buttons).await;
        }
        Ok(())
    }

    async fn on_callback(
        &self,
        bot: &Bot,
        event: &InboundEvent,
        ctx: &Conversation<'_>,
        data: &str,
    ) -> Result<()> {
        match parse_callback(data) {
            Some(Callback::Lang(lang)) => self.show_jobs(bot, ctx, &lang).await,
            Some(Callback::Job { job_id, lang }) => {
                let outcome = self
                    .survey
                    .start_or_resume(bot.id, job_id, &event.user, &lang)
                    .await?;
                ctx.render(&outcome.candidate.lang, &outcome.reply).await;
                Ok(())
            }
            Some(Callback::Answer(option_id)) => {
                let Some(candidate) = self.survey_in_progress(bot, event).await? else {
                    tracing::debug!(%option_id, "button press without a survey in progress ignored");
                    return Ok(());
                };
                let outcome = self
                    .survey
                    .submit_answer(candidate.id, Submission::choice(option_id))
                    .await?;
                ctx.render(&outcome.candidate.lang, &outcome.reply).await;
                Ok(())
            }
            None => {
                tracing::debug!(data, "unrecognized callback data");
                Ok(())
            }
        }
    }

    async fn on_message(
        &self,
        bot: &Bot,
        event: &InboundEvent,
        ctx: &Conversation<'_>,
        submission: Submission,
        text: Option<String>,
    ) -> Result<()> {
        if let Some(candidate) = self.survey_in_progress(bot, event).await? {
            let outcome = self.survey.submit_answer(candidate.id, submission).await?;
            ctx.render(&outcome.candidate.lang, &outcome.reply).await;
            return Ok(());
        }

        let Some(candidate) = self
            .repo
            .find_latest_candidate(bot.id, &event.user.id, CandidateStatus::Active)
            .await?
        else {
            ctx.text(bot_text(&bot.default_lang, BotText::StartHint)).await;
            return Ok(());
        };

        // The final survey answer redelivered after completion.
        if is_redelivery(&candidate, &submission) {
            return Ok(());
        }

        let media = match &submission.payload {
            SubmissionPayload::Media(media) => Some(media),
            _ => None,
        };
        self.relay
            .record_inbound(&candidate, event.message_id, text, media)
            .await?;
        Ok(())
    }

    async fn survey_in_progress(
        &self,
        bot: &Bot,
        event: &InboundEvent,
    ) -> Result<Option<Candidate>> {
        self.repo
            .find_latest_candidate(bot.id, &event.user.id, CandidateStatus::Incomplete)
            .await
    }
}

/// Outbound side of one chat. Send failures are logged, not returned: the
/// state change behind a reply is already committed when it is rendered.
struct Conversation<'a> {
    transport: &'a dyn ChannelTransport,
    chat_id: &'a str,
}

impl Conversation<'_> {
    async fn text(&self, text: &str) {
        if let Err(err) = self.transport.send_text(self.chat_id, text).await {
            tracing::warn!(chat_id = self.chat_id, error = %err, "failed to send bot message");
        }
    }

    async fn buttons(&self, text: &str, buttons: &[ChoiceButton]) {
        if let Err(err) = self.transport.send_choice(self.chat_id, text, buttons).await {
            tracing::warn!(chat_id = self.chat_id, error = %err, "failed to send bot keyboard");
        }
    }

    async fn render(&self, lang: &str, reply: &SurveyReply) {
        match reply {
            SurveyReply::Accepted { next, acknowledged } => {
                if *acknowledged {
                    self.text(bot_text(lang, BotText::AnswerSaved)).await;
                }
                self.render_next(lang, next).await;
            }
            SurveyReply::Rejected(reason) => self.text(reject_text(lang, *reason)).await,
            SurveyReply::AlreadyApplied => self.text(bot_text(lang, BotText::AlreadyApplied)).await,
            SurveyReply::Duplicate(_) => {}
        }
    }

    async fn render_next(&self, lang: &str, next: &NextStep) {
        let prompt = match next {
            NextStep::Completed => {
                self.text(bot_text(lang, BotText::SurveyComplete)).await;
                return;
            }
            NextStep::Ask(prompt) => prompt,
        };

        let text = prompt_text(prompt);
        match prompt.question_type {
            QuestionType::Choice if !prompt.options.is_empty() => {
                let buttons: Vec<ChoiceButton> = prompt
                    .options
                    .iter()
                    .map(|o| ChoiceButton {
                        text: o.text.clone(),
                        data: format!("ans:{}", o.id),
                    })
                    .collect();
                self.buttons(&text, &buttons).await;
            }
            QuestionType::Attachment => {
                self.text(&format!("{}\n\n{}", text, bot_text(lang, BotText::UploadFile)))
                    .await;
            }
            _ => self.text(&text).await,
        }
    }
}
