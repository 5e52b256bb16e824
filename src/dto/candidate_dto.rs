use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::answer::Answer;
use crate::models::candidate::{Candidate, CandidateFile, CandidateStatus, ProfilePatch};
use crate::models::comment::CandidateComment;

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: CandidateStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveColumnPayload {
    /// `null` moves the candidate back to the default lane.
    pub column_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDetail {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub answers: Vec<Answer>,
    pub files: Vec<CandidateFile>,
    pub comments: Vec<CandidateComment>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfilePayload {
    #[validate(length(max = 200))]
    pub full_name: Option<String>,
    #[validate(length(max = 16))]
    pub age: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 254))]
    pub email: Option<String>,
    #[validate(length(min = 2, max = 8))]
    pub lang: Option<String>,
}

impl From<UpdateProfilePayload> for ProfilePatch {
    fn from(p: UpdateProfilePayload) -> Self {
        ProfilePatch {
            full_name: p.full_name,
            age: p.age,
            phone: p.phone,
            email: p.email,
            lang: p.lang,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCommentPayload {
    #[validate(length(min = 1, max = 4000))]
    pub text: String,
}
