use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::Photo;
use crate::dto::{PhotoDto, PhotoForModerationDto};
use crate::repo::RepoError;
use crate::state::DbPool;

#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Records an uploaded photo. New photos are neither approved nor main.
    async fn add(
        &self,
        user_id: &str,
        url: &str,
        storage_key: Option<&str>,
    ) -> Result<PhotoDto, RepoError>;

    async fn get(&self, photo_id: &str) -> Result<Photo, RepoError>;

    /// Like `get`, but not-found when the photo belongs to someone else.
    async fn get_owned(&self, user_id: &str, photo_id: &str) -> Result<Photo, RepoError>;

    /// Swaps the caller's main photo. Only approved photos qualify.
    async fn set_main(&self, user_id: &str, photo_id: &str) -> Result<(), RepoError>;

    async fn remove(&self, photo_id: &str) -> Result<(), RepoError>;

    async fn main_photo_url(&self, user_id: &str) -> Result<Option<String>, RepoError>;

    async fn photos_to_moderate(&self) -> Result<Vec<PhotoForModerationDto>, RepoError>;

    /// Approves a photo, promoting it to main when the owner has none.
    async fn approve(&self, photo_id: &str) -> Result<(), RepoError>;
}

pub type DynPhotoRepository = Arc<dyn PhotoRepository>;

const PHOTO_COLUMNS: &str = "id, user_id, url, storage_key, is_main, is_approved, added_at";

fn map_photo_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        user_id: row.get(1)?,
        url: row.get(2)?,
        storage_key: row.get(3)?,
        is_main: row.get(4)?,
        is_approved: row.get(5)?,
        added_at: row.get(6)?,
    })
}

pub struct SqlitePhotoRepository {
    pool: DbPool,
}

impl SqlitePhotoRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhotoRepository for SqlitePhotoRepository {
    async fn add(
        &self,
        user_id: &str,
        url: &str,
        storage_key: Option<&str>,
    ) -> Result<PhotoDto, RepoError> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO photos (id, user_id, url, storage_key) VALUES (?1, ?2, ?3, ?4)",
            params![id, user_id, url, storage_key],
        )?;
        Ok(PhotoDto {
            id,
            url: url.to_string(),
            is_main: false,
            is_approved: false,
        })
    }

    async fn get(&self, photo_id: &str) -> Result<Photo, RepoError> {
        let conn = self.pool.get()?;
        let photo = conn
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"),
                params![photo_id],
                map_photo_row,
            )
            .optional()?;
        photo.ok_or_else(|| RepoError::NotFound("photo not found".to_string()))
    }

    async fn get_owned(&self, user_id: &str, photo_id: &str) -> Result<Photo, RepoError> {
        let conn = self.pool.get()?;
        let photo = conn
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1 AND user_id = ?2"),
                params![photo_id, user_id],
                map_photo_row,
            )
            .optional()?;
        photo.ok_or_else(|| RepoError::NotFound("photo not found".to_string()))
    }

    async fn set_main(&self, user_id: &str, photo_id: &str) -> Result<(), RepoError> {
        let conn = self.pool.get()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| -> Result<(), RepoError> {
            let photo: Option<(bool, bool)> = conn
                .query_row(
                    "SELECT is_main, is_approved FROM photos WHERE id = ?1 AND user_id = ?2",
                    params![photo_id, user_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((is_main, is_approved)) = photo else {
                return Err(RepoError::NotFound("photo not found".to_string()));
            };
            if is_main {
                return Err(RepoError::Conflict(
                    "This is already your main photo".to_string(),
                ));
            }
            if !is_approved {
                return Err(RepoError::Conflict(
                    "You cannot use an unapproved photo as your main photo".to_string(),
                ));
            }

            // The partial unique index requires clearing the old main first.
            conn.execute(
                "UPDATE photos SET is_main = 0 WHERE user_id = ?1 AND is_main = 1",
                params![user_id],
            )?;
            conn.execute(
                "UPDATE photos SET is_main = 1 WHERE id = ?1",
                params![photo_id],
            )?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute("COMMIT", [])?;
                Ok(())
            }
            Err(e) => {
                conn.execute("ROLLBACK", []).ok();
                Err(e)
            }
        }
    }

    async fn remove(&self, photo_id: &str) -> Result<(), RepoError> {
        let conn = self.pool.get()?;
        let removed = conn.execute("DELETE FROM photos WHERE id = ?1", params![photo_id])?;
        if removed == 0 {
            return Err(RepoError::NotFound("photo not found".to_string()));
        }
        Ok(())
    }

    async fn main_photo_url(&self, user_id: &str) -> Result<Option<String>, RepoError> {
        let conn = self.pool.get()?;
        let url = conn
            .query_row(
                "SELECT url FROM photos
                 WHERE user_id = ?1 AND is_main = 1 AND is_approved = 1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(url)
    }

    async fn photos_to_moderate(&self) -> Result<Vec<PhotoForModerationDto>, RepoError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT p.id, p.url, u.username
             FROM photos p JOIN users u ON u.id = p.user_id
             WHERE p.is_approved = 0
             ORDER BY p.added_at",
        )?;
        let photos = stmt
            .query_map([], |row| {
                Ok(PhotoForModerationDto {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    username: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    async fn approve(&self, photo_id: &str) -> Result<(), RepoError> {
        let conn = self.pool.get()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| -> Result<(), RepoError> {
            let user_id: Option<String> = conn
                .query_row(
                    "SELECT user_id FROM photos WHERE id = ?1",
                    params![photo_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(user_id) = user_id else {
                return Err(RepoError::NotFound("photo not found".to_string()));
            };

            conn.execute(
                "UPDATE photos SET is_approved = 1 WHERE id = ?1",
                params![photo_id],
            )?;

            let has_main: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM photos WHERE user_id = ?1 AND is_main = 1)",
                params![user_id],
                |row| row.get(0),
            )?;
            if !has_main {
                conn.execute(
                    "UPDATE photos SET is_main = 1 WHERE id = ?1",
                    params![photo_id],
                )?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute("COMMIT", [])?;
                Ok(())
            }
            Err(e) => {
                conn.execute("ROLLBACK", []).ok();
                Err(e)
            }
        }
    }
}
