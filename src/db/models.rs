/// A registered account and its profile fields. `username` is stored
/// lowercase; timestamps use the SQLite `datetime('now')` format (UTC).
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub known_as: String,
    pub gender: String,
    pub date_of_birth: String,
    pub city: String,
    pub country: String,
    pub introduction: Option<String>,
    pub looking_for: Option<String>,
    pub interests: Option<String>,
    pub created_at: String,
    pub last_active: String,
}

/// An uploaded profile photo. `storage_key` identifies the stored object
/// so it can be removed again; photos start unapproved and non-main.
#[derive(Debug, Clone)]
pub struct Photo {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub storage_key: Option<String>,
    pub is_main: bool,
    pub is_approved: bool,
    pub added_at: String,
}
