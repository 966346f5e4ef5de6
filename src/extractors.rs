use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use rusqlite::{params, OptionalExtension};

use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub known_as: String,
    pub gender: String,
    pub roles: Vec<String>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == "Admin")
    }

    /// Admins moderate too.
    pub fn is_moderator(&self) -> bool {
        self.roles.iter().any(|r| r == "Admin" || r == "Moderator")
    }
}

/// Extractor that requires a valid bearer token.
/// Returns 401 if the token is missing, unknown, or expired.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;

        let conn = state.db.get()?;
        let user = conn
            .query_row(
                "SELECT u.id, u.username, u.known_as, u.gender,
                        COALESCE((SELECT GROUP_CONCAT(r.name) FROM user_roles ur
                                  JOIN roles r ON r.id = ur.role_id
                                  WHERE ur.user_id = u.id), '')
                 FROM auth_tokens t
                 JOIN users u ON u.id = t.user_id
                 WHERE t.token = ?1 AND t.expires_at > datetime('now')",
                params![token],
                |row| {
                    let joined: String = row.get(4)?;
                    Ok(CurrentUser {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        known_as: row.get(2)?,
                        gender: row.get(3)?,
                        roles: joined
                            .split(',')
                            .filter(|r| !r.is_empty())
                            .map(|r| r.to_string())
                            .collect(),
                    })
                },
            )
            .optional()?
            .ok_or(AppError::Unauthorized)?;

        // Presence counts as activity. Not worth failing the request over.
        conn.execute(
            "UPDATE users SET last_active = datetime('now') WHERE id = ?1",
            params![user.id],
        )
        .ok();

        Ok(user)
    }
}

/// Requires the Admin role on top of authentication.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(RequireAdmin(user))
    }
}

/// Requires a moderation role (Admin or Moderator).
pub struct RequireModerator(pub CurrentUser);

impl FromRequestParts<AppState> for RequireModerator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_moderator() {
            return Err(AppError::Forbidden);
        }
        Ok(RequireModerator(user))
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}
