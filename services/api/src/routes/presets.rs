//! Preset catalog handlers

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::RequestSession,
    models::{PageQuery, Pagination, PresetListQuery, PresetListResponse, PresetPayload, TagsQuery},
    state::AppState,
    validation::{preset_filter, validate_preset},
};

fn preset_not_found() -> ApiError {
    ApiError::NotFound("Preset not found".to_string())
}

/// List public presets with filtering, sorting and pagination
pub async fn list_presets(
    State(state): State<AppState>,
    query: Result<Query<PresetListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let filter = preset_filter(query).map_err(ApiError::BadRequest)?;

    let page = state.presets.list_public(&filter).await.map_err(|e| {
        error!("Failed to fetch presets: {}", e);
        ApiError::Internal("Failed to fetch presets")
    })?;

    Ok(Json(PresetListResponse {
        presets: page.presets,
        total: page.total,
        page: filter.pagination.page,
        limit: filter.pagination.limit,
    }))
}

/// Create a preset owned by the caller
pub async fn create_preset(
    State(state): State<AppState>,
    Extension(current): Extension<RequestSession>,
    payload: Result<Json<PresetPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user = &current.require()?.user;
    let Json(payload) = payload?;
    let input = validate_preset(payload).map_err(ApiError::BadRequest)?;

    let preset = state.presets.create(user.id, &input).await.map_err(|e| {
        error!("Failed to create preset: {}", e);
        ApiError::Internal("Failed to create preset")
    })?;

    info!("User {} created preset {}", user.id, preset.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "preset": preset,
            "message": "Preset created successfully",
        })),
    ))
}

/// Fetch one preset; private presets are only visible to their owner
pub async fn get_preset(
    State(state): State<AppState>,
    Extension(current): Extension<RequestSession>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let viewer = current.user_id();

    let preset = state
        .presets
        .find_by_id(id, viewer)
        .await
        .map_err(|e| {
            error!("Failed to fetch preset: {}", e);
            ApiError::Internal("Failed to fetch preset")
        })?
        .filter(|view| view.preset.is_public || Some(view.preset.user_id) == viewer)
        .ok_or_else(preset_not_found)?;

    let presets = state.presets.clone();
    tokio::spawn(async move {
        if let Err(e) = presets.increment_usage(id).await {
            warn!("Failed to increment usage of preset {}: {}", id, e);
        }
    });

    Ok(Json(json!({ "preset": preset })))
}

/// Replace a preset owned by the caller
pub async fn update_preset(
    State(state): State<AppState>,
    Extension(current): Extension<RequestSession>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PresetPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user = &current.require()?.user;
    let Path(id) = id?;
    let Json(payload) = payload?;
    let input = validate_preset(payload).map_err(ApiError::BadRequest)?;

    let preset = state
        .presets
        .update(id, user.id, &input)
        .await
        .map_err(|e| {
            error!("Failed to update preset: {}", e);
            ApiError::Internal("Failed to update preset")
        })?
        .ok_or_else(preset_not_found)?;

    info!("User {} updated preset {}", user.id, id);

    Ok(Json(json!({
        "preset": preset,
        "message": "Preset updated successfully",
    })))
}

/// Delete a preset owned by the caller
pub async fn delete_preset(
    State(state): State<AppState>,
    Extension(current): Extension<RequestSession>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user = &current.require()?.user;
    let Path(id) = id?;

    let deleted = state.presets.delete(id, user.id).await.map_err(|e| {
        error!("Failed to delete preset: {}", e);
        ApiError::Internal("Failed to delete preset")
    })?;

    if !deleted {
        return Err(preset_not_found());
    }

    info!("User {} deleted preset {}", user.id, id);

    Ok(Json(json!({ "message": "Preset deleted successfully" })))
}

/// Like or unlike a preset
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(current): Extension<RequestSession>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user = &current.require()?.user;
    let Path(id) = id?;

    let liked = state
        .presets
        .toggle_like(id, user.id)
        .await
        .map_err(|e| {
            error!("Failed to toggle like: {}", e);
            ApiError::Internal("Failed to toggle like")
        })?
        .ok_or_else(preset_not_found)?;

    let message = if liked { "Preset liked" } else { "Preset unliked" };

    Ok(Json(json!({
        "liked": liked,
        "message": message,
    })))
}

/// Presets of the caller, private ones included
pub async fn my_presets(
    State(state): State<AppState>,
    Extension(current): Extension<RequestSession>,
) -> Result<impl IntoResponse, ApiError> {
    let user = &current.require()?.user;

    let presets = state
        .presets
        .list_by_owner(user.id, true)
        .await
        .map_err(|e| {
            error!("Failed to fetch user presets: {}", e);
            ApiError::Internal("Failed to fetch presets")
        })?;

    Ok(Json(json!({ "presets": presets })))
}

/// Presets liked by the caller, most recent like first
pub async fn liked_presets(
    State(state): State<AppState>,
    Extension(current): Extension<RequestSession>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user = &current.require()?.user;
    let Query(query) = query?;
    let pagination = Pagination::new(query.page, query.limit);

    let presets = state
        .presets
        .liked_by(user.id, pagination)
        .await
        .map_err(|e| {
            error!("Failed to fetch liked presets: {}", e);
            ApiError::Internal("Failed to fetch presets")
        })?;

    Ok(Json(json!({
        "presets": presets,
        "page": pagination.page,
        "limit": pagination.limit,
    })))
}

/// Public preset counts per category
pub async fn categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = state.presets.categories().await.map_err(|e| {
        error!("Failed to fetch categories: {}", e);
        ApiError::Internal("Failed to fetch categories")
    })?;

    Ok(Json(json!({ "categories": categories })))
}

/// Most used tags among public presets
pub async fn popular_tags(
    State(state): State<AppState>,
    query: Result<Query<TagsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let limit = Pagination::new(None, query.limit).limit;

    let tags = state.presets.popular_tags(limit).await.map_err(|e| {
        error!("Failed to fetch tags: {}", e);
        ApiError::Internal("Failed to fetch tags")
    })?;

    Ok(Json(json!({ "tags": tags })))
}
