use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::dto::MemberDto;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::pagination::{Page, PageParams};
use crate::repo::LikePredicate;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/likes", get(list_likes))
        .route("/api/likes/ids", get(liked_ids))
        .route("/api/likes/{username}", post(toggle_like))
}

/// POST /api/likes/{username}
async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let target = state
        .users
        .get_by_username(&username.to_lowercase())
        .await?
        .ok_or(AppError::NotFound)?;

    let liked = state.likes.toggle(&user.id, &target.id).await?;
    Ok(Json(json!({ "liked": liked })))
}

#[derive(Debug, Default, Deserialize)]
struct LikesQuery {
    predicate: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

/// GET /api/likes
async fn list_likes(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<LikesQuery>,
) -> AppResult<Json<Page<MemberDto>>> {
    let predicate = LikePredicate::from_query(q.predicate.as_deref())
        .ok_or_else(|| AppError::BadRequest("Unknown predicate".into()))?;
    let members = state
        .likes
        .list_members(&user.id, predicate, PageParams::new(q.page, q.page_size))
        .await?;
    Ok(Json(members))
}

/// GET /api/likes/ids
async fn liked_ids(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<String>>> {
    let ids = state.likes.liked_ids(&user.id).await?;
    Ok(Json(ids))
}
