use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::channel::{ChannelUser, MediaRef};
use crate::error::{Error, Result};
use crate::models::answer::AnswerValue;
use crate::models::candidate::{Candidate, CandidateStatus, NewCandidate, NewCandidateFile};
use crate::models::event::{BroadcastEvent, NewApplicationPayload, StatusChangePayload};
use crate::models::question::QuestionType;
use crate::repository::Repository;
use crate::services::broadcast_hub::BroadcastHub;
use crate::services::bot_registry::BotRegistry;
use crate::services::candidate_locks::CandidateLocks;
use crate::services::field_projector::project_field;
use crate::services::pipeline_service::enter_pipeline;
use crate::services::question_resolver::{
    next_servable, resolve_questions, resolve_step, LocalizedOption, LocalizedQuestion, Step,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub question_id: Uuid,
    pub question_type: QuestionType,
    pub number: usize,
    pub total: usize,
    pub text: String,
    pub options: Vec<LocalizedOption>,
}

impl Prompt {
    fn new(question: &LocalizedQuestion, step: i32, total: usize) -> Self {
        Self {
            question_id: question.id,
            question_type: question.question_type,
            number: usize::try_from(step).unwrap_or(0) + 1,
            total,
            text: question.text.clone().unwrap_or_default(),
            options: question.options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    Ask(Prompt),
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    ChooseOption,
    InvalidOption,
    TypeAnswer,
    SendFile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurveyReply {
    /// The answer (or the start request) was taken; `acknowledged` asks the
    /// front end to confirm receipt of a file before showing `next`.
    Accepted { next: NextStep, acknowledged: bool },
    Rejected(RejectReason),
    AlreadyApplied,
    Duplicate(NextStep),
}

#[derive(Debug, Clone)]
pub struct SurveyOutcome {
    pub candidate: Candidate,
    pub reply: SurveyReply,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionPayload {
    Text(String),
    Choice(Uuid),
    Media(MediaRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub message_id: Option<i64>,
    pub payload: SubmissionPayload,
}

impl Submission {
    pub fn text(message_id: Option<i64>, text: impl Into<String>) -> Self {
        Self {
            message_id,
            payload: SubmissionPayload::Text(text.into()),
        }
    }

    pub fn choice(option_id: Uuid) -> Self {
        Self {
            message_id: None,
            payload: SubmissionPayload::Choice(option_id),
        }
    }

    pub fn media(message_id: Option<i64>, media: MediaRef) -> Self {
        Self {
            message_id,
            payload: SubmissionPayload::Media(media),
        }
    }

    /// Identity of this submission as an answer to `step`. Option ids and channel
    /// message ids already name one question; bare text and files do not, so
    /// their key carries the step.
    pub fn fingerprint(&self, step: i32) -> String {
        match (&self.payload, self.message_id) {
            (SubmissionPayload::Choice(option_id), _) => format!("opt:{}", option_id),
            (_, Some(id)) => format!("msg:{}", id),
            (SubmissionPayload::Text(text), None) => format!("text:{}:{}", step, normalize(text)),
            (SubmissionPayload::Media(media), None) => format!("file:{}:{}", step, media.file_ref),
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// True when `submission` repeats the last accepted answer and the cursor has not
/// moved since. `last_answer_step` holds the cursor right after that answer.
pub fn is_redelivery(candidate: &Candidate, submission: &Submission) -> bool {
    if candidate.last_answer_step != Some(candidate.current_step) {
        return false;
    }
    candidate.last_answer_key.as_deref()
        == Some(submission.fingerprint(candidate.current_step).as_str())
}

#[derive(Clone)]
pub struct SurveyService {
    repo: Arc<dyn Repository>,
    hub: Arc<BroadcastHub>,
    locks: CandidateLocks,
    bots: Arc<BotRegistry>,
}

impl SurveyService {
    pub fn new(
        repo: Arc<dyn Repository>,
        hub: Arc<BroadcastHub>,
        locks: CandidateLocks,
        bots: Arc<BotRegistry>,
    ) -> Self {
        Self {
            repo,
            hub,
            locks,
            bots,
        }
    }

    pub async fn start_or_resume(
        &self,
        bot_id: Uuid,
        job_id: Uuid,
        user: &ChannelUser,
        lang: &str,
    ) -> Result<SurveyOutcome> {
        let job = self
            .repo
            .get_job(job_id)
            .await?
            .filter(|j| j.bot_id == bot_id && j.is_active)
            .ok_or_else(|| Error::not_found("Job"))?;

        let candidate = match self.repo.find_candidate(bot_id, &user.id, job.id).await? {
            Some(existing) => existing,
            None => self.open_application(bot_id, job.id, user, lang).await?,
        };

        if candidate.status != CandidateStatus::Incomplete {
            return Ok(SurveyOutcome {
                candidate,
                reply: SurveyReply::AlreadyApplied,
            });
        }

        let _guard = self.locks.lock(candidate.id).await;
        let mut candidate = self.reload(candidate.id).await?;
        if candidate.status != CandidateStatus::Incomplete {
            return Ok(SurveyOutcome {
                candidate,
                reply: SurveyReply::AlreadyApplied,
            });
        }

        if candidate.lang != lang || candidate.username != user.username {
            candidate.lang = lang.to_string();
            candidate.username = user.username.clone();
        }
        candidate.last_activity = Utc::now();
        candidate = self.repo.save_candidate(&candidate).await?;

        let questions = self.questions_for(&candidate).await?;
        let next = self.advance(&mut candidate, &questions).await?;
        Ok(SurveyOutcome {
            candidate,
            reply: SurveyReply::Accepted {
                next,
                acknowledged: false,
            },
        })
    }

    async fn open_application(
        &self,
        bot_id: Uuid,
        job_id: Uuid,
        user: &ChannelUser,
        lang: &str,
    ) -> Result<Candidate> {
        let new = NewCandidate {
            bot_id,
            job_id,
            channel_user_id: user.id.clone(),
            username: user.username.clone(),
            lang: lang.to_string(),
        };
        match self.repo.insert_candidate(new).await {
            Ok(candidate) => {
                tracing::info!(candidate_id = %candidate.id, %bot_id, %job_id, "application opened");
                self.hub
                    .broadcast(&BroadcastEvent::NewApplication(NewApplicationPayload {
                        candidate_id: candidate.id,
                        bot_id,
                        job_id,
                        status: None,
                    }));
                Ok(candidate)
            }
            // Another delivery of the same start request won the insert.
            Err(Error::Conflict(_)) => self
                .repo
                .find_candidate(bot_id, &user.id, job_id)
                .await?
                .ok_or_else(|| Error::Internal("candidate vanished after conflict".to_string())),
            Err(err) => Err(err),
        }
    }

    pub async fn submit_answer(
        &self,
        candidate_id: Uuid,
        submission: Submission,
    ) -> Result<SurveyOutcome> {
        let _guard = self.locks.lock(candidate_id).await;
        let mut candidate = self.reload(candidate_id).await?;
        if candidate.status != CandidateStatus::Incomplete {
            return Err(Error::BadRequest(
                "Survey is already finished for this candidate".to_string(),
            ));
        }

        let questions = self.questions_for(&candidate).await?;

        if is_redelivery(&candidate, &submission) {
            tracing::debug!(%candidate_id, step = candidate.current_step, "duplicate answer ignored");
            let next = self.advance(&mut candidate, &questions).await?;
            return Ok(SurveyOutcome {
                candidate,
                reply: SurveyReply::Duplicate(next),
            });
        }

        let question = match self.current_question(&mut candidate, &questions).await? {
            Some(question) => question,
            None => {
                let next = self.advance(&mut candidate, &questions).await?;
                return Ok(SurveyOutcome {
                    candidate,
                    reply: SurveyReply::Accepted {
                        next,
                        acknowledged: false,
                    },
                });
            }
        };

        let (value, display) = match self.accept(&candidate, &question, &submission).await? {
            Ok(accepted) => accepted,
            Err(reason) => {
                tracing::debug!(%candidate_id, question_id = %question.id, ?reason, "answer rejected");
                return Ok(SurveyOutcome {
                    candidate,
                    reply: SurveyReply::Rejected(reason),
                });
            }
        };

        self.repo
            .upsert_answer(candidate.id, question.id, &value)
            .await?;
        if let Some(field_key) = &question.field_key {
            project_field(&mut candidate, field_key, &display);
        }
        let answered = candidate.current_step;
        candidate.last_answer_key = Some(submission.fingerprint(answered));
        candidate.current_step = next_servable(&questions, answered + 1);
        candidate.last_answer_step = Some(candidate.current_step);
        candidate.last_activity = Utc::now();
        candidate = self.repo.save_candidate(&candidate).await?;
        tracing::info!(
            %candidate_id,
            question_id = %question.id,
            step = candidate.current_step,
            "answer recorded"
        );

        let next = self.advance(&mut candidate, &questions).await?;
        Ok(SurveyOutcome {
            candidate,
            reply: SurveyReply::Accepted {
                next,
                acknowledged: question.question_type == QuestionType::Attachment,
            },
        })
    }

    async fn reload(&self, candidate_id: Uuid) -> Result<Candidate> {
        self.repo
            .get_candidate(candidate_id)
            .await?
            .ok_or_else(|| Error::not_found("Candidate"))
    }

    async fn questions_for(&self, candidate: &Candidate) -> Result<Vec<LocalizedQuestion>> {
        let default_lang = self
            .repo
            .get_bot(candidate.bot_id)
            .await?
            .map(|b| b.default_lang)
            .unwrap_or_else(|| candidate.lang.clone());
        let questions = self
            .repo
            .list_job_questions(candidate.bot_id, candidate.job_id)
            .await?;
        Ok(resolve_questions(&questions, &candidate.lang, &default_lang))
    }

    /// Question under the cursor, persisting past unservable ones. `None` means
    /// the survey is done.
    async fn current_question(
        &self,
        candidate: &mut Candidate,
        questions: &[LocalizedQuestion],
    ) -> Result<Option<LocalizedQuestion>> {
        let step = next_servable(questions, candidate.current_step);
        if step > candidate.current_step {
            tracing::warn!(
                candidate_id = %candidate.id,
                from = candidate.current_step,
                to = step,
                "skipping questions that cannot be shown"
            );
            candidate.current_step = step;
            *candidate = self.repo.save_candidate(candidate).await?;
        }
        Ok(match resolve_step(questions, step) {
            Step::Ask(q) => Some(q.clone()),
            Step::Complete => None,
        })
    }

    async fn advance(
        &self,
        candidate: &mut Candidate,
        questions: &[LocalizedQuestion],
    ) -> Result<NextStep> {
        match self.current_question(candidate, questions).await? {
            Some(question) => Ok(NextStep::Ask(Prompt::new(
                &question,
                candidate.current_step,
                questions.len(),
            ))),
            None => {
                self.complete(candidate, questions.len()).await?;
                Ok(NextStep::Completed)
            }
        }
    }

    async fn complete(&self, candidate: &mut Candidate, total: usize) -> Result<()> {
        enter_pipeline(candidate)?;
        candidate.current_step = candidate
            .current_step
            .min(i32::try_from(total).unwrap_or(i32::MAX));
        *candidate = self.repo.save_candidate(candidate).await?;
        tracing::info!(candidate_id = %candidate.id, "survey completed");

        self.hub
            .broadcast(&BroadcastEvent::NewApplication(NewApplicationPayload {
                candidate_id: candidate.id,
                bot_id: candidate.bot_id,
                job_id: candidate.job_id,
                status: Some(candidate.status),
            }));
        self.hub
            .broadcast(&BroadcastEvent::StatusChange(StatusChangePayload {
                candidate_id: candidate.id,
                status: candidate.status,
            }));
        Ok(())
    }

    /// Checks the submission against the question type. The outer error is a
    /// storage failure; the inner one is a rejection to report to the candidate.
    async fn accept(
        &self,
        candidate: &Candidate,
        question: &LocalizedQuestion,
        submission: &Submission,
    ) -> Result<std::result::Result<(AnswerValue, String), RejectReason>> {
        let accepted = match (question.question_type, &submission.payload) {
            (QuestionType::Text, SubmissionPayload::Text(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    Err(RejectReason::TypeAnswer)
                } else {
                    Ok((AnswerValue::Text(text.to_string()), text.to_string()))
                }
            }
            (QuestionType::Text, _) => Err(RejectReason::TypeAnswer),

            (QuestionType::Choice, SubmissionPayload::Choice(option_id)) => {
                match question.option(*option_id) {
                    Some(option) => Ok((AnswerValue::Option(option.id), option.text.clone())),
                    None => Err(RejectReason::InvalidOption),
                }
            }
            (QuestionType::Choice, _) => Err(RejectReason::ChooseOption),

            (QuestionType::Attachment, SubmissionPayload::Media(media)) => {
                let name = self.store_attachment(candidate, media).await?;
                Ok((AnswerValue::Text(name.clone()), name))
            }
            (QuestionType::Attachment, _) => Err(RejectReason::SendFile),
        };
        Ok(accepted)
    }

    async fn store_attachment(&self, candidate: &Candidate, media: &MediaRef) -> Result<String> {
        let display_name = media.display_name();
        let local_path = match self.bots.transport(candidate.bot_id) {
            Some(transport) => match transport.download_media(&media.file_ref, &display_name).await {
                Ok(path) => Some(path),
                Err(err) => {
                    tracing::warn!(candidate_id = %candidate.id, error = %err, "attachment download failed");
                    None
                }
            },
            None => {
                tracing::warn!(bot_id = %candidate.bot_id, "no transport to download attachment");
                None
            }
        };

        self.repo
            .insert_candidate_file(NewCandidateFile {
                candidate_id: candidate.id,
                file_ref: media.file_ref.clone(),
                file_name: display_name.clone(),
                mime_type: media.mime_type(),
                local_path,
            })
            .await?;
        Ok(display_name)
    }
}
