//! API service routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{error::ApiError, middleware::session_middleware, state::AppState};

mod auth;
mod presets;
mod transcribe;

/// Largest accepted audio upload
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/login/google", get(auth::google_login))
        .route("/login/google/callback", get(auth::google_callback))
        .route("/logout", post(auth::logout))
        .route("/logout/all", post(auth::logout_all))
        .route("/session", get(auth::current_session).post(auth::validate_token))
        .route(
            "/presets",
            get(presets::list_presets).post(presets::create_preset),
        )
        .route("/presets/mine", get(presets::my_presets))
        .route("/presets/liked", get(presets::liked_presets))
        .route("/presets/categories", get(presets::categories))
        .route("/presets/tags", get(presets::popular_tags))
        .route(
            "/presets/:id",
            get(presets::get_preset)
                .put(presets::update_preset)
                .delete(presets::delete_preset),
        )
        .route("/presets/:id/like", post(presets::toggle_like))
        .route(
            "/transcribe",
            post(transcribe::transcribe).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let database = match &state.db_pool {
        Some(pool) => {
            if refile_common::database::health_check(pool).await? {
                "connected"
            } else {
                "disconnected"
            }
        }
        None => "memory",
    };

    Ok(Json(json!({
        "status": "ok",
        "service": "refile-api",
        "database": database,
    })))
}
