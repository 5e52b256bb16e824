use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
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
    message::{Message, NewMessage},
    operator::Operator,
    question::{Question, QuestionOption, QuestionType, Translation},
};

const CANDIDATE_COLUMNS: &str = "id, bot_id, job_id, channel_user_id, username, lang, status, \
     current_step, column_id, full_name, age, phone, email, last_answer_key, last_answer_step, \
     last_activity, created_at, updated_at";

const CANDIDATE_FILTER: &str = "($1::text IS NULL OR status = $1) \
       AND ($2::uuid IS NULL OR bot_id = $2) \
       AND ($3::uuid IS NULL OR job_id = $3) \
       AND ($4::uuid IS NULL OR column_id = $4) \
       AND ($5::text IS NULL \
            OR full_name ILIKE $5 OR username ILIKE $5 OR email ILIKE $5 OR phone ILIKE $5)";

const COMMENT_SELECT: &str = "SELECT c.id, c.candidate_id, c.operator_id, o.name AS operator_name, \
     c.text, c.created_at FROM candidate_comments c LEFT JOIN operators o ON o.id = c.operator_id";

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

const COLUMN_COLUMNS: &str =
    "id, name, color, dot, sort_order AS \"order\", is_archived, created_at, updated_at";

#[derive(FromRow)]
struct QuestionRow {
    id: Uuid,
    bot_id: Uuid,
    job_id: Option<Uuid>,
    question_type: QuestionType,
    sort_order: i32,
    field_key: Option<String>,
    is_active: bool,
}

#[derive(FromRow)]
struct OptionRow {
    id: Uuid,
    question_id: Uuid,
    sort_order: i32,
}

#[derive(FromRow)]
struct TranslationRow {
    owner_id: Uuid,
    lang: String,
    text: String,
}

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    bot_id: Uuid,
    is_active: bool,
}

#[derive(FromRow)]
struct JobTranslationRow {
    job_id: Uuid,
    lang: String,
    title: String,
}

#[derive(FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    candidate: Candidate,
    unread_count: i64,
}

fn group_translations(rows: Vec<TranslationRow>) -> HashMap<Uuid, Vec<Translation>> {
    let mut grouped: HashMap<Uuid, Vec<Translation>> = HashMap::new();
    for row in rows {
        grouped.entry(row.owner_id).or_default().push(Translation {
            lang: row.lang,
            text: row.text,
        });
    }
    grouped
}

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn jobs_with_translations(&self, rows: Vec<JobRow>) -> Result<Vec<Job>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let translations = sqlx::query_as::<_, JobTranslationRow>(
            r#"SELECT job_id, lang, title FROM job_translations WHERE job_id = ANY($1) ORDER BY lang"#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<JobTranslation>> = HashMap::new();
        for t in translations {
            grouped.entry(t.job_id).or_default().push(JobTranslation {
                lang: t.lang,
                title: t.title,
            });
        }

        Ok(rows
            .into_iter()
            .map(|r| Job {
                id: r.id,
                bot_id: r.bot_id,
                is_active: r.is_active,
                translations: grouped.remove(&r.id).unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn get_bot(&self, id: Uuid) -> Result<Option<Bot>> {
        let bot = sqlx::query_as::<_, Bot>(
            r#"SELECT id, name, token, default_lang, is_active, created_at FROM bots WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bot)
    }

    async fn list_active_bots(&self) -> Result<Vec<Bot>> {
        let bots = sqlx::query_as::<_, Bot>(
            r#"SELECT id, name, token, default_lang, is_active, created_at FROM bots WHERE is_active = TRUE ORDER BY created_at"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(bots)
    }

    async fn list_bot_languages(&self, bot_id: Uuid) -> Result<Vec<BotLanguage>> {
        let langs = sqlx::query_as::<_, BotLanguage>(
            r#"SELECT code, name FROM bot_languages WHERE bot_id = $1 ORDER BY code"#,
        )
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(langs)
    }

    async fn list_active_jobs(&self, bot_id: Uuid) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"SELECT id, bot_id, is_active FROM jobs WHERE bot_id = $1 AND is_active = TRUE ORDER BY created_at"#,
        )
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;
        self.jobs_with_translations(rows).await
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(r#"SELECT id, bot_id, is_active FROM jobs WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.jobs_with_translations(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_job_questions(&self, bot_id: Uuid, job_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, bot_id, job_id, question_type, sort_order, field_key, is_active
            FROM questions
            WHERE bot_id = $1 AND job_id = $2 AND is_active = TRUE
            ORDER BY sort_order ASC, id ASC
            "#,
        )
        .bind(bot_id)
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        let question_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let mut question_translations = group_translations(
            sqlx::query_as::<_, TranslationRow>(
                r#"SELECT question_id AS owner_id, lang, text FROM question_translations WHERE question_id = ANY($1)"#,
            )
            .bind(&question_ids)
            .fetch_all(&self.pool)
            .await?,
        );

        let option_rows = sqlx::query_as::<_, OptionRow>(
            r#"SELECT id, question_id, sort_order FROM question_options WHERE question_id = ANY($1) ORDER BY sort_order ASC, id ASC"#,
        )
        .bind(&question_ids)
        .fetch_all(&self.pool)
        .await?;

        let option_ids: Vec<Uuid> = option_rows.iter().map(|o| o.id).collect();
        let mut option_translations = group_translations(
            sqlx::query_as::<_, TranslationRow>(
                r#"SELECT option_id AS owner_id, lang, text FROM option_translations WHERE option_id = ANY($1)"#,
            )
            .bind(&option_ids)
            .fetch_all(&self.pool)
            .await?,
        );

        let mut options: HashMap<Uuid, Vec<QuestionOption>> = HashMap::new();
        for o in option_rows {
            options.entry(o.question_id).or_default().push(QuestionOption {
                id: o.id,
                question_id: o.question_id,
                order: o.sort_order,
                translations: option_translations.remove(&o.id).unwrap_or_default(),
            });
        }

        Ok(rows
            .into_iter()
            .map(|r| Question {
                id: r.id,
                bot_id: r.bot_id,
                job_id: r.job_id,
                question_type: r.question_type,
                order: r.sort_order,
                field_key: r.field_key,
                is_active: r.is_active,
                translations: question_translations.remove(&r.id).unwrap_or_default(),
                options: options.remove(&r.id).unwrap_or_default(),
            })
            .collect())
    }

    async fn find_candidate(
        &self,
        bot_id: Uuid,
        channel_user_id: &str,
        job_id: Uuid,
    ) -> Result<Option<Candidate>> {
        let sql = format!(
            "SELECT {} FROM candidates WHERE bot_id = $1 AND channel_user_id = $2 AND job_id = $3",
            CANDIDATE_COLUMNS
        );
        let candidate = sqlx::query_as::<_, Candidate>(&sql)
            .bind(bot_id)
            .bind(channel_user_id)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(candidate)
    }

    async fn find_latest_candidate(
        &self,
        bot_id: Uuid,
        channel_user_id: &str,
        status: CandidateStatus,
    ) -> Result<Option<Candidate>> {
        let sql = format!(
            "SELECT {} FROM candidates \
             WHERE bot_id = $1 AND channel_user_id = $2 AND status = $3 \
             ORDER BY updated_at DESC LIMIT 1",
            CANDIDATE_COLUMNS
        );
        let candidate = sqlx::query_as::<_, Candidate>(&sql)
            .bind(bot_id)
            .bind(channel_user_id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?;
        Ok(candidate)
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>> {
        let sql = format!("SELECT {} FROM candidates WHERE id = $1", CANDIDATE_COLUMNS);
        let candidate = sqlx::query_as::<_, Candidate>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(candidate)
    }

    async fn insert_candidate(&self, new: NewCandidate) -> Result<Candidate> {
        let sql = format!(
            "INSERT INTO candidates (id, bot_id, job_id, channel_user_id, username, lang, status, current_step) \
             VALUES ($1, $2, $3, $4, $5, $6, 'incomplete', 0) \
             RETURNING {}",
            CANDIDATE_COLUMNS
        );
        let candidate = sqlx::query_as::<_, Candidate>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.bot_id)
            .bind(new.job_id)
            .bind(&new.channel_user_id)
            .bind(&new.username)
            .bind(&new.lang)
            .fetch_one(&self.pool)
            .await?;
        Ok(candidate)
    }

    async fn save_candidate(&self, candidate: &Candidate) -> Result<Candidate> {
        let sql = format!(
            "UPDATE candidates SET \
                username = $2, lang = $3, status = $4, current_step = $5, column_id = $6, \
                full_name = $7, age = $8, phone = $9, email = $10, \
                last_answer_key = $11, last_answer_step = $12, last_activity = $13, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            CANDIDATE_COLUMNS
        );
        let saved = sqlx::query_as::<_, Candidate>(&sql)
            .bind(candidate.id)
            .bind(&candidate.username)
            .bind(&candidate.lang)
            .bind(candidate.status)
            .bind(candidate.current_step)
            .bind(candidate.column_id)
            .bind(&candidate.full_name)
            .bind(&candidate.age)
            .bind(&candidate.phone)
            .bind(&candidate.email)
            .bind(&candidate.last_answer_key)
            .bind(candidate.last_answer_step)
            .bind(candidate.last_activity)
            .fetch_optional(&self.pool)
            .await?;
        saved.ok_or_else(|| Error::not_found("Candidate"))
    }

    async fn touch_candidate(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE candidates SET last_activity = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("Candidate"));
        }
        Ok(())
    }

    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        page: PageRequest,
    ) -> Result<CandidatePage> {
        let pattern = filter.search_term().map(|term| like_pattern(&term));

        let count_sql = format!("SELECT COUNT(*) FROM candidates WHERE {}", CANDIDATE_FILTER);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.status)
            .bind(filter.bot_id)
            .bind(filter.job_id)
            .bind(filter.column_id)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {}, \
                (SELECT COUNT(*) FROM messages m \
                 WHERE m.candidate_id = candidates.id AND m.direction = 'inbound' AND m.is_read = FALSE) AS unread_count \
             FROM candidates \
             WHERE {} \
             ORDER BY last_activity DESC, id \
             LIMIT $6 OFFSET $7",
            CANDIDATE_COLUMNS, CANDIDATE_FILTER
        );
        let rows = sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(filter.status)
            .bind(filter.bot_id)
            .bind(filter.job_id)
            .bind(filter.column_id)
            .bind(&pattern)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(CandidatePage {
            candidates: rows
                .into_iter()
                .map(|r| CandidateSummary {
                    candidate: r.candidate,
                    unread_count: r.unread_count,
                })
                .collect(),
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
        let sql = format!(
            "SELECT {} FROM candidates WHERE column_id = $1 AND ($2::text IS NULL OR status = $2) ORDER BY id",
            CANDIDATE_COLUMNS
        );
        let candidates = sqlx::query_as::<_, Candidate>(&sql)
            .bind(column_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(candidates)
    }

    async fn bulk_transition(
        &self,
        ids: &[Uuid],
        column_id: Uuid,
        transition: BulkTransition,
    ) -> Result<Vec<Candidate>> {
        let sql = format!(
            "UPDATE candidates SET \
                status = $1, \
                column_id = CASE WHEN $2 THEN NULL ELSE column_id END, \
                last_activity = NOW(), updated_at = NOW() \
             WHERE id = ANY($3) AND column_id = $4 AND ($5::text IS NULL OR status = $5) \
             RETURNING {}",
            CANDIDATE_COLUMNS
        );
        let updated = sqlx::query_as::<_, Candidate>(&sql)
            .bind(transition.to)
            .bind(transition.clear_column)
            .bind(ids)
            .bind(column_id)
            .bind(transition.from)
            .fetch_all(&self.pool)
            .await?;
        Ok(updated)
    }

    async fn delete_candidate(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM candidates WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_column_candidates(&self, ids: &[Uuid], column_id: Uuid) -> Result<u64> {
        let result = sqlx::query(r#"DELETE FROM candidates WHERE id = ANY($1) AND column_id = $2"#)
            .bind(ids)
            .bind(column_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_answer(
        &self,
        candidate_id: Uuid,
        question_id: Uuid,
        value: &AnswerValue,
    ) -> Result<Answer> {
        let answer = sqlx::query_as::<_, Answer>(
            r#"
            INSERT INTO answers (id, candidate_id, question_id, text_value, option_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (candidate_id, question_id) DO UPDATE
                SET text_value = EXCLUDED.text_value,
                    option_id = EXCLUDED.option_id,
                    updated_at = NOW()
            RETURNING id, candidate_id, question_id, text_value, option_id, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(candidate_id)
        .bind(question_id)
        .bind(value.text_value())
        .bind(value.option_id())
        .fetch_one(&self.pool)
        .await?;
        Ok(answer)
    }

    async fn list_answers(&self, candidate_id: Uuid) -> Result<Vec<Answer>> {
        let answers = sqlx::query_as::<_, Answer>(
            r#"
            SELECT id, candidate_id, question_id, text_value, option_id, created_at, updated_at
            FROM answers WHERE candidate_id = $1 ORDER BY created_at ASC
            "#,
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }

    async fn insert_candidate_file(&self, file: NewCandidateFile) -> Result<CandidateFile> {
        let row = sqlx::query_as::<_, CandidateFile>(
            r#"
            INSERT INTO candidate_files (id, candidate_id, file_ref, file_name, mime_type, local_path)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, candidate_id, file_ref, file_name, mime_type, local_path, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(file.candidate_id)
        .bind(&file.file_ref)
        .bind(&file.file_name)
        .bind(&file.mime_type)
        .bind(&file.local_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_candidate_files(&self, candidate_id: Uuid) -> Result<Vec<CandidateFile>> {
        let files = sqlx::query_as::<_, CandidateFile>(
            r#"
            SELECT id, candidate_id, file_ref, file_name, mime_type, local_path, created_at
            FROM candidate_files WHERE candidate_id = $1 ORDER BY created_at DESC
            "#,
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    async fn insert_comment(
        &self,
        candidate_id: Uuid,
        operator_id: Uuid,
        text: &str,
    ) -> Result<CandidateComment> {
        let comment = sqlx::query_as::<_, CandidateComment>(
            r#"
            WITH c AS (
                INSERT INTO candidate_comments (id, candidate_id, operator_id, text)
                VALUES ($1, $2, $3, $4)
                RETURNING id, candidate_id, operator_id, text, created_at
            )
            SELECT c.id, c.candidate_id, c.operator_id, o.name AS operator_name, c.text, c.created_at
            FROM c LEFT JOIN operators o ON o.id = c.operator_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(candidate_id)
        .bind(operator_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn list_comments(&self, candidate_id: Uuid) -> Result<Vec<CandidateComment>> {
        let sql = format!(
            "{} WHERE c.candidate_id = $1 ORDER BY c.created_at, c.id",
            COMMENT_SELECT
        );
        let comments = sqlx::query_as::<_, CandidateComment>(&sql)
            .bind(candidate_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }

    async fn delete_comment(&self, candidate_id: Uuid, comment_id: Uuid) -> Result<bool> {
        let result =
            sqlx::query(r#"DELETE FROM candidate_comments WHERE id = $1 AND candidate_id = $2"#)
                .bind(comment_id)
                .bind(candidate_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_message(&self, msg: NewMessage) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, candidate_id, operator_id, direction, message_type, text,
                                  file_ref, file_name, mime_type, local_path, channel_message_id, is_read)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, FALSE)
            RETURNING id, candidate_id, operator_id, direction, message_type, text, file_ref,
                      file_name, mime_type, local_path, channel_message_id, is_read, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(msg.candidate_id)
        .bind(msg.operator_id)
        .bind(msg.direction)
        .bind(msg.message_type)
        .bind(&msg.text)
        .bind(&msg.file_ref)
        .bind(&msg.file_name)
        .bind(&msg.mime_type)
        .bind(&msg.local_path)
        .bind(msg.channel_message_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    async fn list_messages(&self, candidate_id: Uuid) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, candidate_id, operator_id, direction, message_type, text, file_ref,
                   file_name, mime_type, local_path, channel_message_id, is_read, created_at
            FROM messages
            WHERE candidate_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn mark_messages_read(&self, candidate_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE
            WHERE candidate_id = $1 AND direction = 'inbound' AND is_read = FALSE
            "#,
        )
        .bind(candidate_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn unread_count(&self, candidate_id: Uuid) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE candidate_id = $1 AND direction = 'inbound' AND is_read = FALSE
            "#,
        )
        .bind(candidate_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    async fn total_unread_count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM messages WHERE direction = 'inbound' AND is_read = FALSE"#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    async fn list_columns(&self, archived: bool) -> Result<Vec<PipelineColumn>> {
        let order = if archived { "updated_at DESC" } else { "sort_order ASC" };
        let sql = format!(
            "SELECT {} FROM pipeline_columns WHERE is_archived = $1 ORDER BY {}",
            COLUMN_COLUMNS, order
        );
        let columns = sqlx::query_as::<_, PipelineColumn>(&sql)
            .bind(archived)
            .fetch_all(&self.pool)
            .await?;
        Ok(columns)
    }

    async fn get_column(&self, id: Uuid) -> Result<Option<PipelineColumn>> {
        let sql = format!("SELECT {} FROM pipeline_columns WHERE id = $1", COLUMN_COLUMNS);
        let column = sqlx::query_as::<_, PipelineColumn>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(column)
    }

    async fn insert_column(&self, new: NewColumn) -> Result<PipelineColumn> {
        let sql = format!(
            "INSERT INTO pipeline_columns (id, name, color, dot, sort_order) \
             VALUES ($1, $2, $3, $4, (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM pipeline_columns)) \
             RETURNING {}",
            COLUMN_COLUMNS
        );
        let column = sqlx::query_as::<_, PipelineColumn>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.name)
            .bind(&new.color)
            .bind(&new.dot)
            .fetch_one(&self.pool)
            .await?;
        Ok(column)
    }

    async fn update_column(&self, id: Uuid, patch: ColumnPatch) -> Result<PipelineColumn> {
        let sql = format!(
            "UPDATE pipeline_columns SET \
                name = COALESCE($2, name), color = COALESCE($3, color), dot = COALESCE($4, dot), \
                sort_order = COALESCE($5, sort_order), updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            COLUMN_COLUMNS
        );
        let column = sqlx::query_as::<_, PipelineColumn>(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(&patch.color)
            .bind(&patch.dot)
            .bind(patch.order)
            .fetch_optional(&self.pool)
            .await?;
        column.ok_or_else(|| Error::not_found("Column"))
    }

    async fn set_column_archived(&self, id: Uuid, archived: bool) -> Result<PipelineColumn> {
        let sql = format!(
            "UPDATE pipeline_columns SET is_archived = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            COLUMN_COLUMNS
        );
        let column = sqlx::query_as::<_, PipelineColumn>(&sql)
            .bind(id)
            .bind(archived)
            .fetch_optional(&self.pool)
            .await?;
        column.ok_or_else(|| Error::not_found("Column"))
    }

    async fn delete_column(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM pipeline_columns WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reorder_columns(&self, orders: &[(Uuid, i32)]) -> Result<Vec<PipelineColumn>> {
        let sql = format!(
            "UPDATE pipeline_columns SET sort_order = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            COLUMN_COLUMNS
        );
        let mut tx = self.pool.begin().await?;
        let mut updated = Vec::with_capacity(orders.len());
        for (id, order) in orders {
            let column = sqlx::query_as::<_, PipelineColumn>(&sql)
                .bind(*id)
                .bind(*order)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| Error::not_found("Column"))?;
            updated.push(column);
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn find_operator_by_email(&self, email: &str) -> Result<Option<Operator>> {
        let operator = sqlx::query_as::<_, Operator>(
            r#"SELECT id, email, name, password_hash, role, is_active, created_at FROM operators WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(operator)
    }

    async fn get_operator(&self, id: Uuid) -> Result<Option<Operator>> {
        let operator = sqlx::query_as::<_, Operator>(
            r#"SELECT id, email, name, password_hash, role, is_active, created_at FROM operators WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(operator)
    }

    async fn insert_operator(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<Operator> {
        let operator = sqlx::query_as::<_, Operator>(
            r#"
            INSERT INTO operators (id, email, name, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, name, password_hash, role, is_active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(operator)
    }
}
