use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::dto::{MemberDto, MemberUpdate};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::pagination::{Page, PageParams};
use crate::repo::{MemberFilter, MemberOrder};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/members", get(list_members).put(update_profile))
        .route("/api/members/{username}", get(get_member))
        .route("/api/members/photos", post(add_photo))
        .route("/api/members/photos/{photo_id}/main", put(set_main_photo))
        .route("/api/members/photos/{photo_id}", delete(delete_photo))
}

#[derive(Debug, Default, Deserialize)]
struct MemberQuery {
    gender: Option<String>,
    min_age: Option<u32>,
    max_age: Option<u32>,
    order_by: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

/// A browse page with no explicit gender filter shows the opposite gender.
fn default_browse_gender(own_gender: &str) -> Option<String> {
    match own_gender {
        "male" => Some("female".to_string()),
        "female" => Some("male".to_string()),
        _ => None,
    }
}

/// GET /api/members
async fn list_members(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<MemberQuery>,
) -> AppResult<Json<Page<MemberDto>>> {
    let min_age = q.min_age.unwrap_or(18);
    let max_age = q.max_age.unwrap_or(99);
    if min_age > max_age {
        return Err(AppError::BadRequest(
            "min_age cannot be greater than max_age".into(),
        ));
    }

    let gender = match q.gender {
        Some(g) if !g.is_empty() => Some(g.to_lowercase()),
        _ => default_browse_gender(&user.gender),
    };
    let filter = MemberFilter {
        gender,
        min_age,
        max_age,
        order: MemberOrder::from_query(q.order_by.as_deref()),
    };

    let members = state
        .users
        .list_members(&user.id, &filter, PageParams::new(q.page, q.page_size))
        .await?;
    Ok(Json(members))
}

/// GET /api/members/{username}
async fn get_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Json<MemberDto>> {
    let username = username.to_lowercase();
    // Owners and moderators also see photos still awaiting approval.
    let include_unapproved = user.username == username || user.is_moderator();

    let member = state
        .users
        .get_member(&username, include_unapproved)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(member))
}

/// PUT /api/members
async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(update): Json<MemberUpdate>,
) -> AppResult<StatusCode> {
    if update.city.trim().is_empty() || update.country.trim().is_empty() {
        return Err(AppError::BadRequest("City and country are required".into()));
    }

    state.users.update_profile(&user.id, &update).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/members/photos
async fn add_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Response> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let is_image = field
            .content_type()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(AppError::BadRequest("Only image uploads are accepted".into()));
        }

        let filename = field.file_name().unwrap_or("photo.jpg").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".into()));
        }

        let stored = state.photo_storage.save(&filename, &bytes).await?;
        let photo = match state
            .photos
            .add(&user.id, &stored.url, Some(&stored.key))
            .await
        {
            Ok(photo) => photo,
            Err(e) => {
                // The file is orphaned without its row.
                state.photo_storage.delete(&stored.key).await.ok();
                return Err(e.into());
            }
        };
        return Ok((StatusCode::CREATED, Json(photo)).into_response());
    }

    Err(AppError::BadRequest("Missing file field".into()))
}

/// PUT /api/members/photos/{photo_id}/main
async fn set_main_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(photo_id): Path<String>,
) -> AppResult<StatusCode> {
    state.photos.set_main(&user.id, &photo_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/members/photos/{photo_id}
async fn delete_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(photo_id): Path<String>,
) -> AppResult<StatusCode> {
    let photo = state.photos.get_owned(&user.id, &photo_id).await?;
    if photo.is_main {
        return Err(AppError::BadRequest(
            "You cannot delete your main photo".into(),
        ));
    }

    if let Some(key) = &photo.storage_key {
        state.photo_storage.delete(key).await?;
    }
    state.photos.remove(&photo.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
