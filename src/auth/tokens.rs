use rand::Rng;
use rusqlite::params;

use crate::error::AppResult;
use crate::state::DbPool;

/// Issue a new bearer token for a user. Returns the token string.
pub fn issue_token(pool: &DbPool, user_id: &str, hours: u64) -> AppResult<String> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO auth_tokens (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Revoke a token. Revoking an unknown token is not an error.
pub fn revoke_token(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM auth_tokens WHERE token = ?1", params![token])?;
    Ok(())
}

/// Delete expired tokens; returns how many were removed. Called
/// opportunistically on login so the table does not grow unbounded.
pub fn prune_expired(pool: &DbPool) -> AppResult<usize> {
    let conn = pool.get()?;
    let removed = conn.execute(
        "DELETE FROM auth_tokens WHERE expires_at <= datetime('now')",
        [],
    )?;
    Ok(removed)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
