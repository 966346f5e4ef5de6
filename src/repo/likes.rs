use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::params;

use crate::dto::MemberDto;
use crate::pagination::{Page, PageParams};
use crate::repo::users::{attach_approved_photos, map_member_row, MEMBER_COLUMNS};
use crate::repo::RepoError;
use crate::state::DbPool;

/// Which side of the like relationship a listing should follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikePredicate {
    #[default]
    Liked,
    LikedBy,
    Mutual,
}

impl LikePredicate {
    /// `None` for a predicate this API does not know.
    pub fn from_query(value: Option<&str>) -> Option<Self> {
        match value {
            None | Some("") | Some("liked") => Some(LikePredicate::Liked),
            Some("liked_by") => Some(LikePredicate::LikedBy),
            Some("mutual") => Some(LikePredicate::Mutual),
            Some(_) => None,
        }
    }
}

#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Flips the like from `source_id` to `target_id`. Returns true when the
    /// like now exists, false when the call removed it.
    async fn toggle(&self, source_id: &str, target_id: &str) -> Result<bool, RepoError>;

    async fn list_members(
        &self,
        user_id: &str,
        predicate: LikePredicate,
        page: PageParams,
    ) -> Result<Page<MemberDto>, RepoError>;

    /// Ids of every member the user has liked, for client-side toggling.
    async fn liked_ids(&self, user_id: &str) -> Result<Vec<String>, RepoError>;
}

pub type DynLikeRepository = Arc<dyn LikeRepository>;

pub struct SqliteLikeRepository {
    pool: DbPool,
}

impl SqliteLikeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LikeRepository for SqliteLikeRepository {
    async fn toggle(&self, source_id: &str, target_id: &str) -> Result<bool, RepoError> {
        if source_id == target_id {
            return Err(RepoError::Conflict("You cannot like yourself".to_string()));
        }

        let conn = self.pool.get()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| -> Result<bool, RepoError> {
            let removed = conn.execute(
                "DELETE FROM likes WHERE source_user_id = ?1 AND target_user_id = ?2",
                params![source_id, target_id],
            )?;
            if removed > 0 {
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO likes (source_user_id, target_user_id) VALUES (?1, ?2)",
                params![source_id, target_id],
            )?;
            Ok(true)
        })();

        match result {
            Ok(liked) => {
                conn.execute("COMMIT", [])?;
                Ok(liked)
            }
            Err(e) => {
                conn.execute("ROLLBACK", []).ok();
                Err(e)
            }
        }
    }

    async fn list_members(
        &self,
        user_id: &str,
        predicate: LikePredicate,
        page: PageParams,
    ) -> Result<Page<MemberDto>, RepoError> {
        let conn = self.pool.get()?;

        let from_clause = match predicate {
            LikePredicate::Liked => {
                "likes l JOIN users u ON u.id = l.target_user_id
                 WHERE l.source_user_id = ?1"
            }
            LikePredicate::LikedBy => {
                "likes l JOIN users u ON u.id = l.source_user_id
                 WHERE l.target_user_id = ?1"
            }
            LikePredicate::Mutual => {
                "likes l
                 JOIN likes back ON back.source_user_id = l.target_user_id
                                AND back.target_user_id = l.source_user_id
                 JOIN users u ON u.id = l.target_user_id
                 WHERE l.source_user_id = ?1"
            }
        };

        let total_count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {from_clause}"),
            params![user_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM {from_clause}
             ORDER BY l.created_at DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let mut members = stmt
            .query_map(params![user_id, page.limit(), page.offset()], map_member_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        attach_approved_photos(&conn, &mut members)?;

        Ok(Page::new(members, page, total_count))
    }

    async fn liked_ids(&self, user_id: &str) -> Result<Vec<String>, RepoError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT target_user_id FROM likes WHERE source_user_id = ?1 ORDER BY created_at",
        )?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}
