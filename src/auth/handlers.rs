use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;

use crate::auth::{password, tokens};
use crate::dto::{self, AuthUserDto, LoginRequest, RegisterRequest};
use crate::error::{AppError, AppResult};
use crate::extractors::{bearer_token, CurrentUser};
use crate::repo::NewUser;
use crate::state::AppState;

/// POST /api/account/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    let username = req.username.trim().to_lowercase();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".into()));
    }
    if req.password.chars().count() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }
    let known_as = req.known_as.trim().to_string();
    if known_as.is_empty() {
        return Err(AppError::BadRequest("Known as is required".into()));
    }
    let gender = req.gender.trim().to_lowercase();
    if gender.is_empty() {
        return Err(AppError::BadRequest("Gender is required".into()));
    }
    let city = req.city.trim().to_string();
    let country = req.country.trim().to_string();
    if city.is_empty() || country.is_empty() {
        return Err(AppError::BadRequest("City and country are required".into()));
    }

    let date_of_birth = req.date_of_birth.trim().to_string();
    if NaiveDate::parse_from_str(&date_of_birth, "%Y-%m-%d").is_err() {
        return Err(AppError::BadRequest(
            "Date of birth must be a valid YYYY-MM-DD date".into(),
        ));
    }
    if dto::age_from_birth_date(&date_of_birth) < 18 {
        return Err(AppError::BadRequest(
            "You must be at least 18 to register".into(),
        ));
    }

    let password_hash = password::hash_password(&req.password)?;
    let user = state
        .users
        .create(&NewUser {
            username,
            password_hash,
            known_as,
            gender,
            date_of_birth,
            city,
            country,
        })
        .await?;
    let token = tokens::issue_token(&state.db, &user.id, state.config.auth.token_hours)?;

    tracing::info!(username = %user.username, "registered new member");

    Ok((
        StatusCode::CREATED,
        Json(AuthUserDto {
            username: user.username,
            known_as: user.known_as,
            gender: user.gender,
            token,
            photo_url: None,
        }),
    )
        .into_response())
}

/// POST /api/account/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let username = req.username.trim().to_lowercase();
    let user = state
        .users
        .get_by_username(&username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    // Login is a convenient moment to sweep out dead tokens.
    tokens::prune_expired(&state.db).ok();

    let token = tokens::issue_token(&state.db, &user.id, state.config.auth.token_hours)?;
    let photo_url = state.photos.main_photo_url(&user.id).await?;

    Ok(Json(AuthUserDto {
        username: user.username,
        known_as: user.known_as,
        gender: user.gender,
        token,
        photo_url,
    })
    .into_response())
}

/// POST /api/account/logout
pub async fn logout(
    State(state): State<AppState>,
    _user: CurrentUser,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    tokens::revoke_token(&state.db, token)?;
    Ok(StatusCode::NO_CONTENT)
}
