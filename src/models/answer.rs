use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub question_id: Uuid,
    pub text_value: Option<String>,
    pub option_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerValue {
    Text(String),
    Option(Uuid),
}

impl AnswerValue {
    pub fn text_value(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(t) => Some(t),
            AnswerValue::Option(_) => None,
        }
    }

    pub fn option_id(&self) -> Option<Uuid> {
        match self {
            AnswerValue::Text(_) => None,
            AnswerValue::Option(id) => Some(*id),
        }
    }
}
