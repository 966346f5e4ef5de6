//! Shapes returned by (and accepted from) the JSON API, decoupled from
//! the persisted row types.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Account ---

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub known_as: String,
    pub gender: String,
    pub date_of_birth: String,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by register/login: who you are plus the bearer token to use.
#[derive(Debug, Serialize)]
pub struct AuthUserDto {
    pub username: String,
    pub known_as: String,
    pub gender: String,
    pub token: String,
    pub photo_url: Option<String>,
}

// --- Members ---

#[derive(Debug, Clone, Serialize)]
pub struct MemberDto {
    pub id: String,
    pub username: String,
    pub known_as: String,
    pub age: i32,
    pub gender: String,
    pub city: String,
    pub country: String,
    pub introduction: Option<String>,
    pub looking_for: Option<String>,
    pub interests: Option<String>,
    pub created_at: String,
    pub last_active: String,
    pub photo_url: Option<String>,
    pub photos: Vec<PhotoDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhotoDto {
    pub id: String,
    pub url: String,
    pub is_main: bool,
    pub is_approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct MemberUpdate {
    pub introduction: Option<String>,
    pub looking_for: Option<String>,
    pub interests: Option<String>,
    pub city: String,
    pub country: String,
}

// --- Messages ---

#[derive(Debug, Deserialize)]
pub struct NewMessageRequest {
    pub recipient_username: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageDto {
    pub id: String,
    pub sender_username: String,
    pub sender_photo_url: Option<String>,
    pub recipient_username: String,
    pub recipient_photo_url: Option<String>,
    pub content: String,
    pub sent_at: String,
    pub read_at: Option<String>,
}

// --- Administration ---

#[derive(Debug, Serialize)]
pub struct UserWithRolesDto {
    pub id: String,
    pub username: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditRolesRequest {
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PhotoForModerationDto {
    pub id: String,
    pub url: String,
    pub username: String,
}

// --- Conversions ---

/// Render a stored `datetime('now')` value ("%Y-%m-%d %H:%M:%S", UTC) as
/// RFC 3339 for the API. Unparseable input is passed through untouched.
pub fn db_time_to_rfc3339(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S")
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).to_rfc3339())
        .unwrap_or_else(|_| db_time.to_string())
}

/// Age in whole years for an ISO `YYYY-MM-DD` birth date, as of today.
/// Returns 0 for unparseable input.
pub fn age_from_birth_date(date_of_birth: &str) -> i32 {
    let Ok(dob) = NaiveDate::parse_from_str(date_of_birth, "%Y-%m-%d") else {
        return 0;
    };
    age_at(dob, Utc::now().date_naive())
}

fn age_at(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age.max(0)
}
