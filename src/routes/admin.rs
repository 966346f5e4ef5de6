use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::dto::{EditRolesRequest, PhotoForModerationDto, UserWithRolesDto};
use crate::error::AppResult;
use crate::extractors::{RequireAdmin, RequireModerator};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users-with-roles", get(users_with_roles))
        .route("/api/admin/users/{username}/roles", post(edit_roles))
        .route("/api/admin/photos-to-moderate", get(photos_to_moderate))
        .route("/api/admin/photos/{photo_id}/approve", post(approve_photo))
        .route("/api/admin/photos/{photo_id}/reject", post(reject_photo))
}

/// GET /api/admin/users-with-roles
async fn users_with_roles(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<Vec<UserWithRolesDto>>> {
    let users = state.users.users_with_roles().await?;
    Ok(Json(users))
}

/// POST /api/admin/users/{username}/roles
async fn edit_roles(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(username): Path<String>,
    Json(req): Json<EditRolesRequest>,
) -> AppResult<Json<Vec<String>>> {
    let username = username.to_lowercase();
    let roles = state.users.set_roles(&username, &req.roles).await?;

    tracing::info!(admin = %admin.username, user = %username, ?roles, "roles changed");
    Ok(Json(roles))
}

/// GET /api/admin/photos-to-moderate
async fn photos_to_moderate(
    State(state): State<AppState>,
    RequireModerator(_moderator): RequireModerator,
) -> AppResult<Json<Vec<PhotoForModerationDto>>> {
    let photos = state.photos.photos_to_moderate().await?;
    Ok(Json(photos))
}

/// POST /api/admin/photos/{photo_id}/approve
async fn approve_photo(
    State(state): State<AppState>,
    RequireModerator(_moderator): RequireModerator,
    Path(photo_id): Path<String>,
) -> AppResult<StatusCode> {
    state.photos.approve(&photo_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/photos/{photo_id}/reject
async fn reject_photo(
    State(state): State<AppState>,
    RequireModerator(_moderator): RequireModerator,
    Path(photo_id): Path<String>,
) -> AppResult<StatusCode> {
    let photo = state.photos.get(&photo_id).await?;
    if let Some(key) = &photo.storage_key {
        state.photo_storage.delete(key).await?;
    }
    state.photos.remove(&photo.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
