pub mod auth;
pub mod candidates;
pub mod columns;
pub mod health;
pub mod messages;
pub mod telegram;
pub mod ws;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::middleware::{
    auth::require_operator,
    rate_limit::{rps_middleware, RateLimiter},
};
use crate::AppState;

const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

pub fn app(state: AppState) -> Router {
    let base_routes = Router::new()
        .route("/health", get(health::health))
        .route("/ws", get(ws::ws_handler))
        .route(
            "/api/webhook/telegram/:bot_id",
            post(telegram::handle_webhook),
        );

    let login = Router::new().route("/api/auth/login", post(auth::login));

    let operator_api = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/candidates", get(candidates::list_candidates))
        .route(
            "/api/candidates/:id",
            get(candidates::get_candidate)
                .put(candidates::update_profile)
                .delete(candidates::delete_candidate),
        )
        .route(
            "/api/candidates/:id/comments",
            get(candidates::list_comments).post(candidates::add_comment),
        )
        .route(
            "/api/candidates/:id/comments/:comment_id",
            delete(candidates::delete_comment),
        )
        .route("/api/candidates/:id/status", put(candidates::update_status))
        .route("/api/candidates/:id/column", put(candidates::move_column))
        .route("/api/messages/unread", get(messages::unread_total))
        .route(
            "/api/messages/:candidate_id",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/api/messages/:candidate_id/media", post(messages::send_media))
        .route("/api/messages/:candidate_id/read", post(messages::mark_read))
        .route(
            "/api/columns",
            get(columns::list_columns).post(columns::create_column),
        )
        .route("/api/columns/archived", get(columns::list_archived_columns))
        .route("/api/columns/reorder", put(columns::reorder_columns))
        .route(
            "/api/columns/:id",
            put(columns::update_column).delete(columns::delete_column),
        )
        .route("/api/columns/:id/archive", post(columns::archive_column))
        .route("/api/columns/:id/restore", post(columns::restore_column))
        .route_layer(from_fn_with_state(state.clone(), require_operator));

    let limited = login.merge(operator_api).layer(from_fn_with_state(
        RateLimiter::new(state.config.api_rps),
        rps_middleware,
    ));

    let upload_dir = state.config.upload_dir.clone();
    base_routes
        .merge(limited)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
