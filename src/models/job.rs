use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Bot {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub default_lang: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BotLanguage {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobTranslation {
    pub lang: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub is_active: bool,
    pub translations: Vec<JobTranslation>,
}

impl Job {
    pub fn title(&self, lang: &str, default_lang: &str) -> Option<&str> {
        self.translations
            .iter()
            .find(|t| t.lang == lang)
            .or_else(|| self.translations.iter().find(|t| t.lang == default_lang))
            .or_else(|| self.translations.first())
            .map(|t| t.title.as_str())
    }
}
