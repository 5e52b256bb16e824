use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::candidate_dto::{
        CandidateDetail, CreateCommentPayload, MoveColumnPayload, UpdateProfilePayload,
        UpdateStatusPayload,
    },
    error::{Error, Result},
    middleware::auth::Claims,
    models::candidate::{CandidateFilter, PageRequest},
    AppState,
};

#[axum::debug_handler]
pub async fn list_candidates(
    State(state): State<AppState>,
    Query(filter): Query<CandidateFilter>,
    Query(page): Query<PageRequest>,
) -> Result<impl IntoResponse> {
    let page = state.repo.list_candidates(&filter, page).await?;
    Ok(Json(page))
}

#[axum::debug_handler]
pub async fn get_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let candidate = state
        .repo
        .get_candidate(id)
        .await?
        .ok_or_else(|| Error::not_found("Candidate"))?;
    let answers = state.repo.list_answers(id).await?;
    let files = state.repo.list_candidate_files(id).await?;
    let comments = state.repo.list_comments(id).await?;
    let unread_count = state.repo.unread_count(id).await?;
    Ok(Json(CandidateDetail {
        candidate,
        answers,
        files,
        comments,
        unread_count,
    }))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let candidate = state
        .pipeline_service
        .update_profile(id, payload.into())
        .await?;
    Ok(Json(candidate))
}

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse> {
    let candidate = state
        .pipeline_service
        .change_status(id, payload.status)
        .await?;
    Ok(Json(candidate))
}

#[axum::debug_handler]
pub async fn move_column(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MoveColumnPayload>,
) -> Result<impl IntoResponse> {
    let candidate = state
        .pipeline_service
        .move_column(id, payload.column_id)
        .await?;
    Ok(Json(candidate))
}

#[axum::debug_handler]
pub async fn delete_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.pipeline_service.delete_candidate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.pipeline_service.list_comments(id).await?))
}

#[axum::debug_handler]
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCommentPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let comment = state
        .pipeline_service
        .add_comment(id, claims.operator_id()?, &payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[axum::debug_handler]
pub async fn delete_comment(
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    state.pipeline_service.delete_comment(id, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
