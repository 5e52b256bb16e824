use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::column_dto::{
        ColumnChangeResponse, ColumnDeleteResponse, CreateColumnPayload, ReorderColumnsPayload,
        UpdateColumnPayload,
    },
    error::Result,
    services::pipeline_service::ColumnChange,
    AppState,
};

impl From<ColumnChange> for ColumnChangeResponse {
    fn from(change: ColumnChange) -> Self {
        Self {
            column: change.column,
            affected: change.affected,
        }
    }
}

#[axum::debug_handler]
pub async fn list_columns(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.pipeline_service.list_columns(false).await?))
}

#[axum::debug_handler]
pub async fn list_archived_columns(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.pipeline_service.list_columns(true).await?))
}

#[axum::debug_handler]
pub async fn create_column(
    State(state): State<AppState>,
    Json(payload): Json<CreateColumnPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let column = state.pipeline_service.create_column(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(column)))
}

#[axum::debug_handler]
pub async fn update_column(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateColumnPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let column = state
        .pipeline_service
        .update_column(id, payload.into())
        .await?;
    Ok(Json(column))
}

#[axum::debug_handler]
pub async fn reorder_columns(
    State(state): State<AppState>,
    Json(payload): Json<ReorderColumnsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let orders: Vec<(Uuid, i32)> = payload.columns.iter().map(|c| (c.id, c.order)).collect();
    let columns = state.pipeline_service.reorder_columns(&orders).await?;
    Ok(Json(columns))
}

#[axum::debug_handler]
pub async fn archive_column(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let change = state.pipeline_service.archive_column(id).await?;
    Ok(Json(ColumnChangeResponse::from(change)))
}

#[axum::debug_handler]
pub async fn restore_column(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let change = state.pipeline_service.restore_column(id).await?;
    Ok(Json(ColumnChangeResponse::from(change)))
}

#[axum::debug_handler]
pub async fn delete_column(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let outcome = state.pipeline_service.delete_column(id).await?;
    Ok(Json(ColumnDeleteResponse {
        success: true,
        deleted_candidates: outcome.deleted_candidates,
        unassigned: outcome.unassigned.len(),
    }))
}
