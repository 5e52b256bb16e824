pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    answer::{Answer, AnswerValue},
    candidate::{
        Candidate, CandidateFile, CandidateFilter, CandidatePage, CandidateStatus, NewCandidate,
        NewCandidateFile, PageRequest,
    },
    column::{ColumnPatch, NewColumn, PipelineColumn},
    comment::CandidateComment,
    job::{Bot, BotLanguage, Job},
    message::{Message, NewMessage},
    operator::Operator,
    question::Question,
};

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

#[derive(Debug, Clone, Copy)]
pub struct BulkTransition {
    pub from: Option<CandidateStatus>,
    pub to: CandidateStatus,
    pub clear_column: bool,
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_bot(&self, id: Uuid) -> Result<Option<Bot>>;
    async fn list_active_bots(&self) -> Result<Vec<Bot>>;
    async fn list_bot_languages(&self, bot_id: Uuid) -> Result<Vec<BotLanguage>>;
    async fn list_active_jobs(&self, bot_id: Uuid) -> Result<Vec<Job>>;
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>>;

    async fn list_job_questions(&self, bot_id: Uuid, job_id: Uuid) -> Result<Vec<Question>>;

    async fn find_candidate(
        &self,
        bot_id: Uuid,
        channel_user_id: &str,
        job_id: Uuid,
    ) -> Result<Option<Candidate>>;

    /// Most recently touched candidate of this channel user with `status`.
    async fn find_latest_candidate(
        &self,
        bot_id: Uuid,
        channel_user_id: &str,
        status: CandidateStatus,
    ) -> Result<Option<Candidate>>;

    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>>;

    /// Fails with `Error::Conflict` when the (bot, user, job) key already exists.
    async fn insert_candidate(&self, new: NewCandidate) -> Result<Candidate>;

    async fn save_candidate(&self, candidate: &Candidate) -> Result<Candidate>;

    async fn touch_candidate(&self, id: Uuid) -> Result<()>;

    /// Newest activity first. `total` counts every match, not just the page.
    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        page: PageRequest,
    ) -> Result<CandidatePage>;
    async fn list_column_candidates(
        &self,
        column_id: Uuid,
        status: Option<CandidateStatus>,
    ) -> Result<Vec<Candidate>>;

    /// Applies `transition` to the listed candidates that still reference `column_id`
    /// (and match `transition.from`) in a single commit.
    async fn bulk_transition(
        &self,
        ids: &[Uuid],
        column_id: Uuid,
        transition: BulkTransition,
    ) -> Result<Vec<Candidate>>;

    async fn delete_candidate(&self, id: Uuid) -> Result<bool>;
    async fn delete_column_candidates(&self, ids: &[Uuid], column_id: Uuid) -> Result<u64>;

    async fn upsert_answer(
        &self,
        candidate_id: Uuid,
        question_id: Uuid,
        value: &AnswerValue,
    ) -> Result<Answer>;
    async fn list_answers(&self, candidate_id: Uuid) -> Result<Vec<Answer>>;
    async fn insert_candidate_file(&self, file: NewCandidateFile) -> Result<CandidateFile>;
    async fn list_candidate_files(&self, candidate_id: Uuid) -> Result<Vec<CandidateFile>>;

    async fn insert_comment(
        &self,
        candidate_id: Uuid,
        operator_id: Uuid,
        text: &str,
    ) -> Result<CandidateComment>;
    async fn list_comments(&self, candidate_id: Uuid) -> Result<Vec<CandidateComment>>;
    async fn delete_comment(&self, candidate_id: Uuid, comment_id: Uuid) -> Result<bool>;

    async fn insert_message(&self, msg: NewMessage) -> Result<Message>;
    async fn list_messages(&self, candidate_id: Uuid) -> Result<Vec<Message>>;
    async fn mark_messages_read(&self, candidate_id: Uuid) -> Result<u64>;
    async fn unread_count(&self, candidate_id: Uuid) -> Result<i64>;
    async fn total_unread_count(&self) -> Result<i64>;

    async fn list_columns(&self, archived: bool) -> Result<Vec<PipelineColumn>>;
    async fn get_column(&self, id: Uuid) -> Result<Option<PipelineColumn>>;
    async fn insert_column(&self, new: NewColumn) -> Result<PipelineColumn>;
    async fn update_column(&self, id: Uuid, patch: ColumnPatch) -> Result<PipelineColumn>;
    async fn set_column_archived(&self, id: Uuid, archived: bool) -> Result<PipelineColumn>;
    async fn delete_column(&self, id: Uuid) -> Result<bool>;
    /// All or nothing: an unknown id fails with `Error::NotFound` and no order changes.
    async fn reorder_columns(&self, orders: &[(Uuid, i32)]) -> Result<Vec<PipelineColumn>>;

    async fn find_operator_by_email(&self, email: &str) -> Result<Option<Operator>>;
    async fn get_operator(&self, id: Uuid) -> Result<Option<Operator>>;
    async fn insert_operator(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<Operator>;
}
