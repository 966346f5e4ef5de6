use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Months, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::User;
use crate::dto::{self, MemberDto, MemberUpdate, PhotoDto, UserWithRolesDto};
use crate::pagination::{Page, PageParams};
use crate::repo::RepoError;
use crate::state::DbPool;

/// Sort order for member listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemberOrder {
    Created,
    #[default]
    LastActive,
}

impl MemberOrder {
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("created") => MemberOrder::Created,
            _ => MemberOrder::LastActive,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            MemberOrder::Created => "u.created_at DESC",
            MemberOrder::LastActive => "u.last_active DESC",
        }
    }
}

/// Filtering options for the member list.
#[derive(Debug, Clone)]
pub struct MemberFilter {
    pub gender: Option<String>,
    pub min_age: u32,
    pub max_age: u32,
    pub order: MemberOrder,
}

impl Default for MemberFilter {
    fn default() -> Self {
        Self {
            gender: None,
            min_age: 18,
            max_age: 99,
            order: MemberOrder::default(),
        }
    }
}

/// Everything required to insert a user row. The username must already be
/// normalized to lowercase and the password hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub known_as: String,
    pub gender: String,
    pub date_of_birth: String,
    pub city: String,
    pub country: String,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Creates a user and grants the Member role in one transaction.
    async fn create(&self, new_user: &NewUser) -> Result<User, RepoError>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;

    /// Pages through members other than the requester.
    async fn list_members(
        &self,
        requester_id: &str,
        filter: &MemberFilter,
        page: PageParams,
    ) -> Result<Page<MemberDto>, RepoError>;

    async fn get_member(
        &self,
        username: &str,
        include_unapproved: bool,
    ) -> Result<Option<MemberDto>, RepoError>;

    async fn update_profile(&self, user_id: &str, update: &MemberUpdate) -> Result<(), RepoError>;

    async fn users_with_roles(&self) -> Result<Vec<UserWithRolesDto>, RepoError>;

    /// Replaces a user's role set. Role names must exist and at least one
    /// must be given. Returns the resulting role names sorted.
    async fn set_roles(&self, username: &str, roles: &[String]) -> Result<Vec<String>, RepoError>;
}

pub type DynUserRepository = Arc<dyn UserRepository>;

/// Column list shared by every query that produces a `MemberDto`. The final
/// column is the approved main photo url, or NULL.
pub(crate) const MEMBER_COLUMNS: &str = "u.id, u.username, u.known_as, u.gender, u.date_of_birth, \
     u.city, u.country, u.introduction, u.looking_for, u.interests, \
     u.created_at, u.last_active, \
     (SELECT url FROM photos p WHERE p.user_id = u.id AND p.is_main = 1 AND p.is_approved = 1)";

pub(crate) fn map_member_row(row: &Row<'_>) -> rusqlite::Result<MemberDto> {
    let date_of_birth: String = row.get(4)?;
    let created_at: String = row.get(10)?;
    let last_active: String = row.get(11)?;
    Ok(MemberDto {
        id: row.get(0)?,
        username: row.get(1)?,
        known_as: row.get(2)?,
        gender: row.get(3)?,
        age: dto::age_from_birth_date(&date_of_birth),
        city: row.get(5)?,
        country: row.get(6)?,
        introduction: row.get(7)?,
        looking_for: row.get(8)?,
        interests: row.get(9)?,
        created_at: dto::db_time_to_rfc3339(&created_at),
        last_active: dto::db_time_to_rfc3339(&last_active),
        photo_url: row.get(12)?,
        photos: Vec::new(),
    })
}

/// Fills in the approved photo collections for a page of members.
pub(crate) fn attach_approved_photos(
    conn: &Connection,
    members: &mut [MemberDto],
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "SELECT id, url, is_main, is_approved FROM photos
         WHERE user_id = ?1 AND is_approved = 1
         ORDER BY added_at",
    )?;
    for member in members.iter_mut() {
        member.photos = stmt
            .query_map(params![member.id], map_photo_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
    }
    Ok(())
}

fn map_photo_row(row: &Row<'_>) -> rusqlite::Result<PhotoDto> {
    Ok(PhotoDto {
        id: row.get(0)?,
        url: row.get(1)?,
        is_main: row.get(2)?,
        is_approved: row.get(3)?,
    })
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        known_as: row.get(3)?,
        gender: row.get(4)?,
        date_of_birth: row.get(5)?,
        city: row.get(6)?,
        country: row.get(7)?,
        introduction: row.get(8)?,
        looking_for: row.get(9)?,
        interests: row.get(10)?,
        created_at: row.get(11)?,
        last_active: row.get(12)?,
    })
}

const USER_COLUMNS: &str = "id, username, password_hash, known_as, gender, date_of_birth, \
     city, country, introduction, looking_for, interests, created_at, last_active";

/// Date-of-birth window for an inclusive age range. Ages are inclusive on
/// both ends, so the window spans from the day after someone turns
/// `max_age + 1` up to the latest birth date that makes someone `min_age`.
/// Ages beyond 130 are clamped; nobody is older than that.
fn dob_bounds(min_age: u32, max_age: u32) -> (String, String) {
    let min_age = min_age.min(130);
    let max_age = max_age.min(130);
    let today = Utc::now().date_naive();
    let oldest = today
        .checked_sub_months(Months::new(12 * (max_age + 1)))
        .unwrap_or(today);
    let youngest = today
        .checked_sub_months(Months::new(12 * min_age))
        .unwrap_or(today);
    (
        oldest.format("%Y-%m-%d").to_string(),
        youngest.format("%Y-%m-%d").to_string(),
    )
}

pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, new_user: &NewUser) -> Result<User, RepoError> {
        let conn = self.pool.get()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| -> Result<User, RepoError> {
            let taken: Option<String> = conn
                .query_row(
                    "SELECT id FROM users WHERE username = ?1",
                    params![new_user.username],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(RepoError::Conflict("Username is taken".to_string()));
            }

            let id = uuid::Uuid::now_v7().to_string();
            conn.execute(
                "INSERT INTO users (id, username, password_hash, known_as, gender,
                                    date_of_birth, city, country)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    new_user.username,
                    new_user.password_hash,
                    new_user.known_as,
                    new_user.gender,
                    new_user.date_of_birth,
                    new_user.city,
                    new_user.country,
                ],
            )?;
            conn.execute(
                "INSERT INTO user_roles (user_id, role_id)
                 SELECT ?1, id FROM roles WHERE name = 'Member'",
                params![id],
            )?;

            let user = conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                map_user_row,
            )?;
            Ok(user)
        })();

        match result {
            Ok(user) => {
                conn.execute("COMMIT", [])?;
                Ok(user)
            }
            Err(e) => {
                conn.execute("ROLLBACK", []).ok();
                Err(e)
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                map_user_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn list_members(
        &self,
        requester_id: &str,
        filter: &MemberFilter,
        page: PageParams,
    ) -> Result<Page<MemberDto>, RepoError> {
        let conn = self.pool.get()?;
        let (oldest_dob, youngest_dob) = dob_bounds(filter.min_age, filter.max_age);

        let where_clause = "u.id <> ?1
               AND (?2 IS NULL OR u.gender = ?2)
               AND u.date_of_birth > ?3
               AND u.date_of_birth <= ?4";

        let total_count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM users u WHERE {where_clause}"),
            params![requester_id, filter.gender, oldest_dob, youngest_dob],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM users u
             WHERE {where_clause}
             ORDER BY {}
             LIMIT ?5 OFFSET ?6",
            filter.order.sql()
        ))?;
        let mut members = stmt
            .query_map(
                params![
                    requester_id,
                    filter.gender,
                    oldest_dob,
                    youngest_dob,
                    page.limit(),
                    page.offset(),
                ],
                map_member_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        attach_approved_photos(&conn, &mut members)?;

        Ok(Page::new(members, page, total_count))
    }

    async fn get_member(
        &self,
        username: &str,
        include_unapproved: bool,
    ) -> Result<Option<MemberDto>, RepoError> {
        let conn = self.pool.get()?;
        let member = conn
            .query_row(
                &format!("SELECT {MEMBER_COLUMNS} FROM users u WHERE u.username = ?1"),
                params![username],
                map_member_row,
            )
            .optional()?;

        let Some(mut member) = member else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT id, url, is_main, is_approved FROM photos
             WHERE user_id = ?1 AND (is_approved = 1 OR ?2 = 1)
             ORDER BY added_at",
        )?;
        member.photos = stmt
            .query_map(params![member.id, include_unapproved], map_photo_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(member))
    }

    async fn update_profile(&self, user_id: &str, update: &MemberUpdate) -> Result<(), RepoError> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE users SET introduction = ?1, looking_for = ?2, interests = ?3,
                              city = ?4, country = ?5
             WHERE id = ?6",
            params![
                update.introduction,
                update.looking_for,
                update.interests,
                update.city,
                update.country,
                user_id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound("user not found".to_string()));
        }
        Ok(())
    }

    async fn users_with_roles(&self) -> Result<Vec<UserWithRolesDto>, RepoError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username,
                    COALESCE((SELECT GROUP_CONCAT(r.name) FROM user_roles ur
                              JOIN roles r ON r.id = ur.role_id
                              WHERE ur.user_id = u.id), '')
             FROM users u
             ORDER BY u.username",
        )?;
        let users = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let username: String = row.get(1)?;
                let joined: String = row.get(2)?;
                let mut roles: Vec<String> = joined
                    .split(',')
                    .filter(|r| !r.is_empty())
                    .map(|r| r.to_string())
                    .collect();
                roles.sort();
                Ok(UserWithRolesDto {
                    id,
                    username,
                    roles,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    async fn set_roles(&self, username: &str, roles: &[String]) -> Result<Vec<String>, RepoError> {
        if roles.is_empty() {
            return Err(RepoError::Conflict(
                "You must select at least one role".to_string(),
            ));
        }
        let requested: BTreeSet<&str> = roles.iter().map(|r| r.as_str()).collect();

        let conn = self.pool.get()?;
        let user_id: Option<String> = conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        let Some(user_id) = user_id else {
            return Err(RepoError::NotFound("user not found".to_string()));
        };

        let mut role_ids = Vec::with_capacity(requested.len());
        for name in &requested {
            let role_id: Option<String> = conn
                .query_row(
                    "SELECT id FROM roles WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;
            match role_id {
                Some(id) => role_ids.push(id),
                None => return Err(RepoError::Conflict(format!("Unknown role: {name}"))),
            }
        }

        conn.execute("BEGIN IMMEDIATE", [])?;
        let result = (|| -> Result<(), RepoError> {
            conn.execute(
                "DELETE FROM user_roles WHERE user_id = ?1",
                params![user_id],
            )?;
            for role_id in &role_ids {
                conn.execute(
                    "INSERT INTO user_roles (user_id, role_id) VALUES (?1, ?2)",
                    params![user_id, role_id],
                )?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute("COMMIT", [])?;
                Ok(requested.into_iter().map(|r| r.to_string()).collect())
            }
            Err(e) => {
                conn.execute("ROLLBACK", []).ok();
                Err(e)
            }
        }
    }
}
