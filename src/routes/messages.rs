use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;

use crate::dto::{MessageDto, NewMessageRequest};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::pagination::{Page, PageParams};
use crate::repo::MessageContainer;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/messages", get(list_messages).post(send_message))
        .route("/api/messages/thread/{username}", get(thread))
        .route("/api/messages/{message_id}", delete(delete_message))
}

/// POST /api/messages
async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<NewMessageRequest>,
) -> AppResult<Response> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Message content is required".into()));
    }

    let recipient = state
        .users
        .get_by_username(&req.recipient_username.to_lowercase())
        .await?
        .ok_or(AppError::NotFound)?;

    let message = state.messages.create(&user.id, &recipient.id, content).await?;
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct MessagesQuery {
    container: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

/// GET /api/messages
async fn list_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<MessagesQuery>,
) -> AppResult<Json<Page<MessageDto>>> {
    let container = MessageContainer::from_query(q.container.as_deref());
    let messages = state
        .messages
        .list(&user.id, container, PageParams::new(q.page, q.page_size))
        .await?;
    Ok(Json(messages))
}

/// GET /api/messages/thread/{username}
async fn thread(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Json<Vec<MessageDto>>> {
    let other = state
        .users
        .get_by_username(&username.to_lowercase())
        .await?
        .ok_or(AppError::NotFound)?;

    let messages = state.messages.thread(&user.id, &other.id).await?;
    Ok(Json(messages))
}

/// DELETE /api/messages/{message_id}
async fn delete_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(message_id): Path<String>,
) -> AppResult<StatusCode> {
    state.messages.delete(&user.id, &message_id).await?;
    Ok(StatusCode::OK)
}
