use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineColumn {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub dot: String,
    pub order: i32,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewColumn {
    pub name: String,
    pub color: String,
    pub dot: String,
}

#[derive(Debug, Clone, Default)]
pub struct ColumnPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub dot: Option<String>,
    pub order: Option<i32>,
}
