use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    Choice,
    Attachment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub lang: String,
    pub text: String,
}

impl Translation {
    pub fn new(lang: &str, text: &str) -> Self {
        Self {
            lang: lang.to_string(),
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub order: i32,
    pub translations: Vec<Translation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub job_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub order: i32,
    pub field_key: Option<String>,
    pub is_active: bool,
    pub translations: Vec<Translation>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn option(&self, option_id: Uuid) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}
