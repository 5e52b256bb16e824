use axum::{
    extract::{Extension, State},
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::auth_dto::{LoginPayload, LoginResponse},
    error::{Error, Result},
    middleware::auth::{issue_token, Claims},
    utils::crypto::verify_password,
    AppState,
};

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let email = payload.email.trim().to_lowercase();

    let invalid = || Error::Unauthorized("Invalid email or password".to_string());
    let operator = state
        .repo
        .find_operator_by_email(&email)
        .await?
        .filter(|op| op.is_active)
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &operator.password_hash) {
        tracing::warn!(email = %email, "failed login attempt");
        return Err(invalid());
    }

    let token = issue_token(&operator, &state.config.jwt_secret)?;
    tracing::info!(operator_id = %operator.id, "operator logged in");
    Ok(Json(LoginResponse { token, operator }))
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let operator = state
        .repo
        .get_operator(claims.operator_id()?)
        .await?
        .ok_or_else(|| Error::not_found("Operator"))?;
    Ok(Json(operator))
}
