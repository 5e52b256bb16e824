use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::candidate::{Candidate, CandidateStatus, ProfilePatch};
use crate::models::column::{ColumnPatch, NewColumn, PipelineColumn};
use crate::models::comment::CandidateComment;
use crate::models::event::{BroadcastEvent, StatusChangePayload};
use crate::repository::{BulkTransition, Repository};
use crate::services::broadcast_hub::BroadcastHub;
use crate::services::candidate_locks::CandidateLocks;

pub fn apply_status(candidate: &mut Candidate, to: CandidateStatus) -> Result<bool> {
    let from = candidate.status;
    if from == to {
        return Ok(false);
    }
    match (from, to) {
        (_, CandidateStatus::Incomplete) => {
            return Err(Error::BadRequest(
                "Candidates cannot be moved back into the survey".to_string(),
            ))
        }
        (CandidateStatus::Incomplete, _) => {
            return Err(Error::BadRequest(
                "Candidate has not finished the survey yet".to_string(),
            ))
        }
        (_, CandidateStatus::Active) | (_, CandidateStatus::Hired) => candidate.column_id = None,
        (_, CandidateStatus::Archived) => {}
    }
    candidate.status = to;
    Ok(true)
}

pub fn enter_pipeline(candidate: &mut Candidate) -> Result<()> {
    if candidate.status != CandidateStatus::Incomplete {
        return Err(Error::BadRequest(format!(
            "Candidate is already {}",
            candidate.status
        )));
    }
    candidate.status = CandidateStatus::Active;
    candidate.column_id = None;
    Ok(())
}

/// Column assignment is only meaningful for candidates in the pipeline.
pub fn apply_column(candidate: &mut Candidate, column_id: Option<Uuid>) -> Result<bool> {
    if column_id.is_some() && candidate.status != CandidateStatus::Active {
        return Err(Error::BadRequest(format!(
            "Only active candidates can be placed in a column (candidate is {})",
            candidate.status
        )));
    }
    if candidate.column_id == column_id {
        return Ok(false);
    }
    candidate.column_id = column_id;
    Ok(true)
}

#[derive(Debug, Clone)]
pub struct ColumnChange {
    pub column: PipelineColumn,
    pub affected: Vec<Candidate>,
}

#[derive(Debug, Clone)]
pub struct ColumnDeletion {
    pub deleted_candidates: u64,
    pub unassigned: Vec<Candidate>,
}

#[derive(Clone)]
pub struct PipelineService {
    repo: Arc<dyn Repository>,
    hub: Arc<BroadcastHub>,
    locks: CandidateLocks,
}

impl PipelineService {
    pub fn new(repo: Arc<dyn Repository>, hub: Arc<BroadcastHub>, locks: CandidateLocks) -> Self {
        Self { repo, hub, locks }
    }

    async fn load(&self, candidate_id: Uuid) -> Result<Candidate> {
        self.repo
            .get_candidate(candidate_id)
            .await?
            .ok_or_else(|| Error::not_found("Candidate"))
    }

    fn announce(&self, candidate: &Candidate) {
        self.hub
            .broadcast(&BroadcastEvent::StatusChange(StatusChangePayload {
                candidate_id: candidate.id,
                status: candidate.status,
            }));
        self.hub
            .broadcast(&BroadcastEvent::CandidateUpdate(candidate.clone()));
    }

    pub async fn change_status(&self, candidate_id: Uuid, status: CandidateStatus) -> Result<Candidate> {
        let _guard = self.locks.lock(candidate_id).await;
        let mut candidate = self.load(candidate_id).await?;
        let from = candidate.status;
        if !apply_status(&mut candidate, status)? {
            return Ok(candidate);
        }
        let saved = self.repo.save_candidate(&candidate).await?;
        tracing::info!(%candidate_id, %from, to = %status, "candidate status changed");
        self.announce(&saved);
        Ok(saved)
    }

    pub async fn move_column(&self, candidate_id: Uuid, column_id: Option<Uuid>) -> Result<Candidate> {
        if let Some(column_id) = column_id {
            let column = self
                .repo
                .get_column(column_id)
                .await?
                .ok_or_else(|| Error::not_found("Column"))?;
            if column.is_archived {
                return Err(Error::BadRequest(
                    "Cannot move a candidate into an archived column".to_string(),
                ));
            }
        }

        let _guard = self.locks.lock(candidate_id).await;
        let mut candidate = self.load(candidate_id).await?;
        if !apply_column(&mut candidate, column_id)? {
            return Ok(candidate);
        }
        let saved = self.repo.save_candidate(&candidate).await?;
        tracing::info!(%candidate_id, column_id = ?column_id, "candidate moved");
        self.announce(&saved);
        Ok(saved)
    }

    pub async fn update_profile(&self, candidate_id: Uuid, patch: ProfilePatch) -> Result<Candidate> {
        let _guard = self.locks.lock(candidate_id).await;
        let mut candidate = self.load(candidate_id).await?;
        if patch.is_empty() {
            return Ok(candidate);
        }
        patch.apply(&mut candidate);
        candidate.last_activity = Utc::now();
        let saved = self.repo.save_candidate(&candidate).await?;
        tracing::info!(%candidate_id, "candidate profile edited");
        self.hub
            .broadcast(&BroadcastEvent::CandidateUpdate(saved.clone()));
        Ok(saved)
    }

    pub async fn list_comments(&self, candidate_id: Uuid) -> Result<Vec<CandidateComment>> {
        self.load(candidate_id).await?;
        self.repo.list_comments(candidate_id).await
    }

    pub async fn add_comment(
        &self,
        candidate_id: Uuid,
        operator_id: Uuid,
        text: &str,
    ) -> Result<CandidateComment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::BadRequest("Comment text is required".to_string()));
        }
        self.load(candidate_id).await?;
        let comment = self
            .repo
            .insert_comment(candidate_id, operator_id, text)
            .await?;
        tracing::info!(%candidate_id, comment_id = %comment.id, %operator_id, "comment added");
        Ok(comment)
    }

    pub async fn delete_comment(&self, candidate_id: Uuid, comment_id: Uuid) -> Result<()> {
        if !self.repo.delete_comment(candidate_id, comment_id).await? {
            return Err(Error::not_found("Comment"));
        }
        tracing::info!(%candidate_id, %comment_id, "comment deleted");
        Ok(())
    }

    pub async fn delete_candidate(&self, candidate_id: Uuid) -> Result<()> {
        let guard = self.locks.lock(candidate_id).await;
        let candidate = self.load(candidate_id).await?;
        if candidate.status != CandidateStatus::Archived {
            return Err(Error::BadRequest(
                "Only archived candidates can be deleted".to_string(),
            ));
        }
        if !self.repo.delete_candidate(candidate_id).await? {
            return Err(Error::not_found("Candidate"));
        }
        drop(guard);
        self.locks.forget(candidate_id);
        tracing::info!(%candidate_id, "candidate deleted");
        Ok(())
    }

    pub async fn list_columns(&self, archived: bool) -> Result<Vec<PipelineColumn>> {
        self.repo.list_columns(archived).await
    }

    pub async fn create_column(&self, new: NewColumn) -> Result<PipelineColumn> {
        let column = self.repo.insert_column(new).await?;
        tracing::info!(column_id = %column.id, name = %column.name, "column created");
        Ok(column)
    }

    pub async fn update_column(&self, column_id: Uuid, patch: ColumnPatch) -> Result<PipelineColumn> {
        self.repo.update_column(column_id, patch).await
    }

    pub async fn reorder_columns(&self, orders: &[(Uuid, i32)]) -> Result<Vec<PipelineColumn>> {
        let mut seen = HashSet::new();
        if let Some((id, _)) = orders.iter().find(|(id, _)| !seen.insert(*id)) {
            return Err(Error::BadRequest(format!("Column {} listed twice", id)));
        }
        let columns = self.repo.reorder_columns(orders).await?;
        tracing::info!(columns = columns.len(), "columns reordered");
        Ok(columns)
    }

    async fn load_column(&self, column_id: Uuid) -> Result<PipelineColumn> {
        self.repo
            .get_column(column_id)
            .await?
            .ok_or_else(|| Error::not_found("Column"))
    }

    async fn bulk_apply(
        &self,
        column_id: Uuid,
        transition: BulkTransition,
    ) -> Result<Vec<Candidate>> {
        let members = self
            .repo
            .list_column_candidates(column_id, transition.from)
            .await?;
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = members.iter().map(|c| c.id).collect();
        let _guards = self.locks.lock_many(&ids).await;
        self.repo.bulk_transition(&ids, column_id, transition).await
    }

    /// Archives the column together with every active candidate in it. The
    /// candidates keep their column so [`Self::restore_column`] can bring them back.
    pub async fn archive_column(&self, column_id: Uuid) -> Result<ColumnChange> {
        self.load_column(column_id).await?;
        let affected = self
            .bulk_apply(
                column_id,
                BulkTransition {
                    from: Some(CandidateStatus::Active),
                    to: CandidateStatus::Archived,
                    clear_column: false,
                },
            )
            .await?;
        let column = self.repo.set_column_archived(column_id, true).await?;
        for candidate in &affected {
            self.announce(candidate);
        }
        tracing::info!(%column_id, archived = affected.len(), "column archived");
        Ok(ColumnChange { column, affected })
    }

    pub async fn restore_column(&self, column_id: Uuid) -> Result<ColumnChange> {
        self.load_column(column_id).await?;
        let affected = self
            .bulk_apply(
                column_id,
                BulkTransition {
                    from: Some(CandidateStatus::Archived),
                    to: CandidateStatus::Active,
                    clear_column: false,
                },
            )
            .await?;
        let column = self.repo.set_column_archived(column_id, false).await?;
        for candidate in &affected {
            self.announce(candidate);
        }
        tracing::info!(%column_id, restored = affected.len(), "column restored");
        Ok(ColumnChange { column, affected })
    }

    /// Deleting an archived column deletes its candidates. Deleting an active
    /// column moves its candidates back to the default lane as `active`.
    pub async fn delete_column(&self, column_id: Uuid) -> Result<ColumnDeletion> {
        let column = self.load_column(column_id).await?;

        let outcome = if column.is_archived {
            let members = self.repo.list_column_candidates(column_id, None).await?;
            let ids: Vec<Uuid> = members.iter().map(|c| c.id).collect();
            let guards = self.locks.lock_many(&ids).await;
            let deleted = self.repo.delete_column_candidates(&ids, column_id).await?;
            drop(guards);
            for id in &ids {
                self.locks.forget(*id);
            }
            ColumnDeletion {
                deleted_candidates: deleted,
                unassigned: Vec::new(),
            }
        } else {
            let unassigned = self
                .bulk_apply(
                    column_id,
                    BulkTransition {
                        from: None,
                        to: CandidateStatus::Active,
                        clear_column: true,
                    },
                )
                .await?;
            ColumnDeletion {
                deleted_candidates: 0,
                unassigned,
            }
        };

        if !self.repo.delete_column(column_id).await? {
            return Err(Error::not_found("Column"));
        }
        for candidate in &outcome.unassigned {
            self.announce(candidate);
        }
        tracing::info!(
            %column_id,
            deleted_candidates = outcome.deleted_candidates,
            unassigned = outcome.unassigned.len(),
            "column deleted"
        );
        Ok(outcome)
    }
}
