use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Internal operator note on a candidate. Never sent to the candidate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateComment {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub operator_id: Option<Uuid>,
    pub operator_name: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
