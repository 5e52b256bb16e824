use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BulkTransition, Repository};
use crate::error::{Error, Result};
use crate::models::{
    answer::{Answer, AnswerValue},
    candidate::{
        Candidate, CandidateFile, CandidateFilter, CandidatePage, CandidateStatus,
        CandidateSummary, NewCandidate, NewCandidateFile, PageRequest,
    },
    column::{ColumnPatch, NewColumn, PipelineColumn},
    comment::CandidateComment,
    job::{Bot, BotLanguage, Job, JobTranslation},
    message::{Message, MessageDirection, NewMessage},
    operator::Operator,
    question::Question,
};

#[derive(Default)]
struct State {
    bots: Vec<Bot>,
    bot_languages: HashMap<Uuid, Vec<BotLanguage>>,
    jobs: Vec<Job>,
    questions: Vec<Question>,
    candidates: HashMap<Uuid, Candidate>,
    // monotonic "last written" marker; wall clock ties are common in tests
    touched: HashMap<Uuid, u64>,
    seq: u64,
    answers: Vec<Answer>,
    files: Vec<CandidateFile>,
    messages: Vec<Message>,
    comments: Vec<CandidateComment>,
    columns: Vec<PipelineColumn>,
    operators: Vec<Operator>,
}

impl State {
    fn touch(&mut self, id: Uuid) {
        self.seq += 1;
        self.touched.insert(id, self.seq);
    }

    fn unread(&self, candidate_id: Uuid) -> i64 {
        self.messages
            .iter()
            .filter(|m| {
                m.candidate_id == candidate_id
                    && m.direction == MessageDirection::Inbound
                    && !m.is_read
            })
            .count() as i64
    }

    fn remove_candidate(&mut self, id: Uuid) -> bool {
        let removed = self.candidates.remove(&id).is_some();
        if removed {
            self.touched.remove(&id);
            self.answers.retain(|a| a.candidate_id != id);
            self.files.retain(|f| f.candidate_id != id);
            self.messages.retain(|m| m.candidate_id != id);
            self.comments.retain(|c| c.candidate_id != id);
        }
        removed
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_bot(&self, name: &str, token: &str, default_lang: &str, languages: &[(&str, &str)]) -> Bot {
        let bot = Bot {
            id: Uuid::new_v4(),
            name: name.to_string(),
            token: token.to_string(),
            default_lang: default_lang.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        let mut state = self.state.write().await;
        state.bot_languages.insert(
            bot.id,
            languages
                .iter()
                .map(|(code, name)| BotLanguage {
                    code: code.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        );
        state.bots.push(bot.clone());
        bot
    }

    pub async fn add_job(&self, bot_id: Uuid, titles: &[(&str, &str)]) -> Job {
        let job = Job {
            id: Uuid::new_v4(),
            bot_id,
            is_active: true,
            translations: titles
                .iter()
                .map(|(lang, title)| JobTranslation {
                    lang: lang.to_string(),
                    title: title.to_string(),
                })
                .collect(),
        };
        self.state.write().await.jobs.push(job.clone());
        job
    }

    pub async fn add_question(&self, question: Question) -> Question {
        self.state.write().await.questions.push(question.clone());
        question
    }

    pub async fn set_question_active(&self, question_id: Uuid, active: bool) {
        let mut state = self.state.write().await;
        if let Some(q) = state.questions.iter_mut().find(|q| q.id == question_id) {
            q.is_active = active;
        }
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_bot(&self, id: Uuid) -> Result<Option<Bot>> {
        Ok(self.state.read().await.bots.iter().find(|b| b.id == id).cloned())
    }

    async fn list_active_bots(&self) -> Result<Vec<Bot>> {
        Ok(self
            .state
            .read()
            .await
            .bots
            .iter()
            .filter(|b| b.is_active)
            .cloned()
            .collect())
    }

    async fn list_bot_languages(&self, bot_id: Uuid) -> Result<Vec<BotLanguage>> {
        Ok(self
            .state
            .read()
            .await
            .bot_languages
            .get(&bot_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_active_jobs(&self, bot_id: Uuid) -> Result<Vec<Job>> {
        Ok(self
            .state
            .read()
            .await
            .jobs
            .iter()
            .filter(|j| j.bot_id == bot_id && j.is_active)
            .cloned()
            .collect())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.state.read().await.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn list_job_questions(&self, bot_id: Uuid, job_id: Uuid) -> Result<Vec<Question>> {
        let state = self.state.read().await;
        let mut questions: Vec<Question> = state
            .questions
            .iter()
            .filter(|q| q.bot_id == bot_id && q.job_id == Some(job_id) && q.is_active)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.order);
        for q in &mut questions {
            q.options.sort_by_key(|o| o.order);
        }
        Ok(questions)
    }

    async fn find_candidate(
        &self,
        bot_id: Uuid,
        channel_user_id: &str,
        job_id: Uuid,
    ) -> Result<Option<Candidate>> {
        Ok(self
            .state
            .read()
            .await
            .candidates
            .values()
            .find(|c| c.bot_id == bot_id && c.channel_user_id == channel_user_id && c.job_id == job_id)
            .cloned())
    }

    async fn find_latest_candidate(
        &self,
        bot_id: Uuid,
        channel_user_id: &str,
        status: CandidateStatus,
    ) -> Result<Option<Candidate>> {
        let state = self.state.read().await;
        Ok(state
            .candidates
            .values()
            .filter(|c| {
                c.bot_id == bot_id && c.channel_user_id == channel_user_id && c.status == status
            })
            .max_by_key(|c| state.touched.get(&c.id).copied().unwrap_or_default())
            .cloned())
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>> {
        Ok(self.state.read().await.candidates.get(&id).cloned())
    }

    async fn insert_candidate(&self, new: NewCandidate) -> Result<Candidate> {
        let mut state = self.state.write().await;
        let exists = state.candidates.values().any(|c| {
            c.bot_id == new.bot_id && c.channel_user_id == new.channel_user_id && c.job_id == new.job_id
        });
        if exists {
            return Err(Error::Conflict(
                "candidate already exists for this bot, user and job".to_string(),
            ));
        }

        let now = Utc::now();
        let candidate = Candidate {
            id: Uuid::new_v4(),
            bot_id: new.bot_id,
            job_id: new.job_id,
            channel_user_id: new.channel_user_id,
            username: new.username,
            lang: new.lang,
            status: CandidateStatus::Incomplete,
            current_step: 0,
            column_id: None,
            full_name: None,
            age: None,
            phone: None,
            email: None,
            last_answer_key: None,
            last_answer_step: None,
            last_activity: now,
            created_at: now,
            updated_at: now,
        };
        state.candidates.insert(candidate.id, candidate.clone());
        state.touch(candidate.id);
        Ok(candidate)
    }

    async fn save_candidate(&self, candidate: &Candidate) -> Result<Candidate> {
        let mut state = self.state.write().await;
        let stored = state
            .candidates
            .get_mut(&candidate.id)
            .ok_or_else(|| Error::not_found("Candidate"))?;
        let mut updated = candidate.clone();
        updated.created_at = stored.created_at;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        state.touch(updated.id);
        Ok(updated)
    }

    async fn touch_candidate(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        let stored = state
            .candidates
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("Candidate"))?;
        stored.last_activity = Utc::now();
        state.touch(id);
        Ok(())
    }

    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        page: PageRequest,
    ) -> Result<CandidatePage> {
        let state = self.state.read().await;
        let mut matched: Vec<&Candidate> =
            state.candidates.values().filter(|c| filter.matches(c)).collect();
        matched.sort_by(|a, b| {
            b.last_activity
                .cmp(&a.last_activity)
                .then_with(|| a.id.cmp(&b.id))
        });
        let total = matched.len() as i64;
        let candidates = matched
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|c| CandidateSummary {
                candidate: c.clone(),
                unread_count: state.unread(c.id),
            })
            .collect();
        Ok(CandidatePage {
            candidates,
            total,
            page: page.page(),
            pages: page.pages(total),
        })
    }

    async fn list_column_candidates(
        &self,
        column_id: Uuid,
        status: Option<CandidateStatus>,
    ) -> Result<Vec<Candidate>> {
        let state = self.state.read().await;
        let mut candidates: Vec<Candidate> = state
            .candidates
            .values()
            .filter(|c| c.column_id == Some(column_id) && status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        candidates.sort_by_key(|c| c.id);
        Ok(candidates)
    }

    async fn bulk_transition(
        &self,
        ids: &[Uuid],
        column_id: Uuid,
        transition: BulkTransition,
    ) -> Result<Vec<Candidate>> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut updated = Vec::new();
        for id in ids {
            let Some(c) = state.candidates.get_mut(id) else {
                continue;
            };
            if c.column_id != Some(column_id) || transition.from.map_or(false, |s| c.status != s) {
                continue;
            }
            c.status = transition.to;
            if transition.clear_column {
                c.column_id = None;
            }
            c.last_activity = now;
            c.updated_at = now;
            updated.push(c.clone());
        }
        for c in &updated {
            state.touch(c.id);
        }
        Ok(updated)
    }

    async fn delete_candidate(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.write().await.remove_candidate(id))
    }

    async fn delete_column_candidates(&self, ids: &[Uuid], column_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut deleted = 0;
        for id in ids {
            let linked = state
                .candidates
                .get(id)
                .map_or(false, |c| c.column_id == Some(column_id));
            if linked && state.remove_candidate(*id) {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn upsert_answer(
        &self,
        candidate_id: Uuid,
        question_id: Uuid,
        value: &AnswerValue,
    ) -> Result<Answer> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        if let Some(existing) = state
            .answers
            .iter_mut()
            .find(|a| a.candidate_id == candidate_id && a.question_id == question_id)
        {
            existing.text_value = value.text_value().map(str::to_string);
            existing.option_id = value.option_id();
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let answer = Answer {
            id: Uuid::new_v4(),
            candidate_id,
            question_id,
            text_value: value.text_value().map(str::to_string),
            option_id: value.option_id(),
            created_at: now,
            updated_at: now,
        };
        state.answers.push(answer.clone());
        Ok(answer)
    }

    async fn list_answers(&self, candidate_id: Uuid) -> Result<Vec<Answer>> {
        Ok(self
            .state
            .read()
            .await
            .answers
            .iter()
            .filter(|a| a.candidate_id == candidate_id)
            .cloned()
            .collect())
    }

    async fn insert_candidate_file(&self, file: NewCandidateFile) -> Result<CandidateFile> {
        let row = CandidateFile {
            id: Uuid::new_v4(),
            candidate_id: file.candidate_id,
            file_ref: file.file_ref,
            file_name: file.file_name,
            mime_type: file.mime_type,
            local_path: file.local_path,
            created_at: Utc::now(),
        };
        self.state.write().await.files.push(row.clone());
        Ok(row)
    }

    async fn list_candidate_files(&self, candidate_id: Uuid) -> Result<Vec<CandidateFile>> {
        Ok(self
            .state
            .read()
            .await
            .files
            .iter()
            .rev()
            .filter(|f| f.candidate_id == candidate_id)
            .cloned()
            .collect())
    }

    async fn insert_comment(
        &self,
        candidate_id: Uuid,
        operator_id: Uuid,
        text: &str,
    ) -> Result<CandidateComment> {
        let mut state = self.state.write().await;
        if !state.candidates.contains_key(&candidate_id) {
            return Err(Error::not_found("Candidate"));
        }
        let operator_name = state
            .operators
            .iter()
            .find(|o| o.id == operator_id)
            .map(|o| o.name.clone());
        let comment = CandidateComment {
            id: Uuid::new_v4(),
            candidate_id,
            operator_id: Some(operator_id),
            operator_name,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, candidate_id: Uuid) -> Result<Vec<CandidateComment>> {
        Ok(self
            .state
            .read()
            .await
            .comments
            .iter()
            .filter(|c| c.candidate_id == candidate_id)
            .cloned()
            .collect())
    }

    async fn delete_comment(&self, candidate_id: Uuid, comment_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.comments.len();
        state
            .comments
            .retain(|c| !(c.id == comment_id && c.candidate_id == candidate_id));
        Ok(state.comments.len() != before)
    }

    async fn insert_message(&self, msg: NewMessage) -> Result<Message> {
        let mut state = self.state.write().await;
        if !state.candidates.contains_key(&msg.candidate_id) {
            return Err(Error::not_found("Candidate"));
        }
        let message = Message {
            id: Uuid::new_v4(),
            candidate_id: msg.candidate_id,
            operator_id: msg.operator_id,
            direction: msg.direction,
            message_type: msg.message_type,
            text: msg.text,
            file_ref: msg.file_ref,
            file_name: msg.file_name,
            mime_type: msg.mime_type,
            local_path: msg.local_path,
            channel_message_id: msg.channel_message_id,
            is_read: false,
            created_at: Utc::now(),
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, candidate_id: Uuid) -> Result<Vec<Message>> {
        Ok(self
            .state
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.candidate_id == candidate_id)
            .cloned()
            .collect())
    }

    async fn mark_messages_read(&self, candidate_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for m in state.messages.iter_mut().filter(|m| {
            m.candidate_id == candidate_id && m.direction == MessageDirection::Inbound && !m.is_read
        }) {
            m.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn unread_count(&self, candidate_id: Uuid) -> Result<i64> {
        Ok(self.state.read().await.unread(candidate_id))
    }

    async fn total_unread_count(&self) -> Result<i64> {
        Ok(self
            .state
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.direction == MessageDirection::Inbound && !m.is_read)
            .count() as i64)
    }

    async fn list_columns(&self, archived: bool) -> Result<Vec<PipelineColumn>> {
        let state = self.state.read().await;
        let mut columns: Vec<PipelineColumn> = state
            .columns
            .iter()
            .filter(|c| c.is_archived == archived)
            .cloned()
            .collect();
        if archived {
            columns.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        } else {
            columns.sort_by_key(|c| c.order);
        }
        Ok(columns)
    }

    async fn get_column(&self, id: Uuid) -> Result<Option<PipelineColumn>> {
        Ok(self.state.read().await.columns.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_column(&self, new: NewColumn) -> Result<PipelineColumn> {
        let mut state = self.state.write().await;
        let order = state.columns.iter().map(|c| c.order + 1).max().unwrap_or(0);
        let now = Utc::now();
        let column = PipelineColumn {
            id: Uuid::new_v4(),
            name: new.name,
            color: new.color,
            dot: new.dot,
            order,
            is_archived: false,
            created_at: now,
            updated_at: now,
        };
        state.columns.push(column.clone());
        Ok(column)
    }

    async fn update_column(&self, id: Uuid, patch: ColumnPatch) -> Result<PipelineColumn> {
        let mut state = self.state.write().await;
        let column = state
            .columns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::not_found("Column"))?;
        if let Some(name) = patch.name {
            column.name = name;
        }
        if let Some(color) = patch.color {
            column.color = color;
        }
        if let Some(dot) = patch.dot {
            column.dot = dot;
        }
        if let Some(order) = patch.order {
            column.order = order;
        }
        column.updated_at = Utc::now();
        Ok(column.clone())
    }

    async fn set_column_archived(&self, id: Uuid, archived: bool) -> Result<PipelineColumn> {
        let mut state = self.state.write().await;
        let column = state
            .columns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::not_found("Column"))?;
        column.is_archived = archived;
        column.updated_at = Utc::now();
        Ok(column.clone())
    }

    async fn delete_column(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.columns.len();
        state.columns.retain(|c| c.id != id);
        let removed = state.columns.len() != before;
        if removed {
            // ON DELETE SET NULL
            for c in state.candidates.values_mut() {
                if c.column_id == Some(id) {
                    c.column_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn reorder_columns(&self, orders: &[(Uuid, i32)]) -> Result<Vec<PipelineColumn>> {
        let mut state = self.state.write().await;
        if orders
            .iter()
            .any(|(id, _)| !state.columns.iter().any(|c| c.id == *id))
        {
            return Err(Error::not_found("Column"));
        }
        let now = Utc::now();
        let mut updated = Vec::with_capacity(orders.len());
        for (id, order) in orders {
            if let Some(column) = state.columns.iter_mut().find(|c| c.id == *id) {
                column.order = *order;
                column.updated_at = now;
                updated.push(column.clone());
            }
        }
        Ok(updated)
    }

    async fn find_operator_by_email(&self, email: &str) -> Result<Option<Operator>> {
        Ok(self
            .state
            .read()
            .await
            .operators
            .iter()
            .find(|o| o.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_operator(&self, id: Uuid) -> Result<Option<Operator>> {
        Ok(self.state.read().await.operators.iter().find(|o| o.id == id).cloned())
    }

    async fn insert_operator(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<Operator> {
        let mut state = self.state.write().await;
        if state.operators.iter().any(|o| o.email.eq_ignore_ascii_case(email)) {
            return Err(Error::Conflict(format!("operator {} already exists", email)));
        }
        let operator = Operator {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            password_hash: password_hash.to_string(),
            role: role.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        state.operators.push(operator.clone());
        Ok(operator)
    }
}
