use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::candidate::Candidate;
use crate::models::column::{ColumnPatch, NewColumn, PipelineColumn};

pub const DEFAULT_COLUMN_COLOR: &str = "bg-slate-50";
pub const DEFAULT_COLUMN_DOT: &str = "bg-slate-400";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateColumnPayload {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub color: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub dot: Option<String>,
}

impl From<CreateColumnPayload> for NewColumn {
    fn from(p: CreateColumnPayload) -> Self {
        NewColumn {
            name: p.name.trim().to_string(),
            color: p.color.unwrap_or_else(|| DEFAULT_COLUMN_COLOR.to_string()),
            dot: p.dot.unwrap_or_else(|| DEFAULT_COLUMN_DOT.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateColumnPayload {
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub color: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub dot: Option<String>,
    #[validate(range(min = 0))]
    pub order: Option<i32>,
}

impl From<UpdateColumnPayload> for ColumnPatch {
    fn from(p: UpdateColumnPayload) -> Self {
        ColumnPatch {
            name: p.name.map(|n| n.trim().to_string()),
            color: p.color,
            dot: p.dot,
            order: p.order,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ColumnOrder {
    pub id: Uuid,
    #[validate(range(min = 0))]
    pub order: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReorderColumnsPayload {
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub columns: Vec<ColumnOrder>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnChangeResponse {
    pub column: PipelineColumn,
    pub affected: Vec<Candidate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDeleteResponse {
    pub success: bool,
    pub deleted_candidates: u64,
    pub unassigned: usize,
}
