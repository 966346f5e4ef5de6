use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use crate::dto::{self, MessageDto};
use crate::pagination::{Page, PageParams};
use crate::repo::RepoError;
use crate::state::DbPool;

/// Which mailbox a message listing reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageContainer {
    Inbox,
    Outbox,
    #[default]
    Unread,
}

impl MessageContainer {
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("inbox") => MessageContainer::Inbox,
            Some("outbox") => MessageContainer::Outbox,
            _ => MessageContainer::Unread,
        }
    }
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
    ) -> Result<MessageDto, RepoError>;

    async fn list(
        &self,
        user_id: &str,
        container: MessageContainer,
        page: PageParams,
    ) -> Result<Page<MessageDto>, RepoError>;

    /// Full conversation between two members, oldest first. Marks the other
    /// party's messages to the caller as read.
    async fn thread(&self, user_id: &str, other_id: &str) -> Result<Vec<MessageDto>, RepoError>;

    /// Soft-deletes the caller's side. The row is physically removed once
    /// both participants have deleted it.
    async fn delete(&self, user_id: &str, message_id: &str) -> Result<(), RepoError>;
}

pub type DynMessageRepository = Arc<dyn MessageRepository>;

const MESSAGE_COLUMNS: &str = "m.id, su.username, \
     (SELECT url FROM photos p WHERE p.user_id = m.sender_id AND p.is_main = 1 AND p.is_approved = 1), \
     ru.username, \
     (SELECT url FROM photos p WHERE p.user_id = m.recipient_id AND p.is_main = 1 AND p.is_approved = 1), \
     m.content, m.sent_at, m.read_at";

const MESSAGE_JOINS: &str = "messages m
     JOIN users su ON su.id = m.sender_id
     JOIN users ru ON ru.id = m.recipient_id";

fn map_message_row(row: &Row<'_>) -> rusqlite::Result<MessageDto> {
    let sent_at: String = row.get(6)?;
    let read_at: Option<String> = row.get(7)?;
    Ok(MessageDto {
        id: row.get(0)?,
        sender_username: row.get(1)?,
        sender_photo_url: row.get(2)?,
        recipient_username: row.get(3)?,
        recipient_photo_url: row.get(4)?,
        content: row.get(5)?,
        sent_at: dto::db_time_to_rfc3339(&sent_at),
        read_at: read_at.map(|t| dto::db_time_to_rfc3339(&t)),
    })
}

pub struct SqliteMessageRepository {
    pool: DbPool,
}

impl SqliteMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for SqliteMessageRepository {
    async fn create(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
    ) -> Result<MessageDto, RepoError> {
        if sender_id == recipient_id {
            return Err(RepoError::Conflict(
                "You cannot message yourself".to_string(),
            ));
        }

        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO messages (id, sender_id, recipient_id, content)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, sender_id, recipient_id, content],
        )?;

        let message = conn.query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM {MESSAGE_JOINS} WHERE m.id = ?1"),
            params![id],
            map_message_row,
        )?;
        Ok(message)
    }

    async fn list(
        &self,
        user_id: &str,
        container: MessageContainer,
        page: PageParams,
    ) -> Result<Page<MessageDto>, RepoError> {
        let conn = self.pool.get()?;

        let where_clause = match container {
            MessageContainer::Inbox => "m.recipient_id = ?1 AND m.recipient_deleted = 0",
            MessageContainer::Outbox => "m.sender_id = ?1 AND m.sender_deleted = 0",
            MessageContainer::Unread => {
                "m.recipient_id = ?1 AND m.recipient_deleted = 0 AND m.read_at IS NULL"
            }
        };

        let total_count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM messages m WHERE {where_clause}"),
            params![user_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM {MESSAGE_JOINS}
             WHERE {where_clause}
             ORDER BY m.sent_at DESC, m.id DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let messages = stmt
            .query_map(
                params![user_id, page.limit(), page.offset()],
                map_message_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Page::new(messages, page, total_count))
    }

    async fn thread(&self, user_id: &str, other_id: &str) -> Result<Vec<MessageDto>, RepoError> {
        let conn = self.pool.get()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| -> Result<Vec<MessageDto>, RepoError> {
            conn.execute(
                "UPDATE messages SET read_at = datetime('now')
                 WHERE recipient_id = ?1 AND sender_id = ?2 AND read_at IS NULL",
                params![user_id, other_id],
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM {MESSAGE_JOINS}
                 WHERE (m.sender_id = ?1 AND m.recipient_id = ?2 AND m.sender_deleted = 0)
                    OR (m.sender_id = ?2 AND m.recipient_id = ?1 AND m.recipient_deleted = 0)
                 ORDER BY m.sent_at ASC, m.id ASC"
            ))?;
            let messages = stmt
                .query_map(params![user_id, other_id], map_message_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(messages)
        })();

        match result {
            Ok(messages) => {
                conn.execute("COMMIT", [])?;
                Ok(messages)
            }
            Err(e) => {
                conn.execute("ROLLBACK", []).ok();
                Err(e)
            }
        }
    }

    async fn delete(&self, user_id: &str, message_id: &str) -> Result<(), RepoError> {
        let conn = self.pool.get()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| -> Result<(), RepoError> {
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT sender_id, recipient_id FROM messages WHERE id = ?1",
                    params![message_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((sender_id, recipient_id)) = row else {
                return Err(RepoError::NotFound("message not found".to_string()));
            };
            if user_id != sender_id && user_id != recipient_id {
                return Err(RepoError::Forbidden(
                    "You cannot delete this message".to_string(),
                ));
            }

            if user_id == sender_id {
                conn.execute(
                    "UPDATE messages SET sender_deleted = 1 WHERE id = ?1",
                    params![message_id],
                )?;
            }
            if user_id == recipient_id {
                conn.execute(
                    "UPDATE messages SET recipient_deleted = 1 WHERE id = ?1",
                    params![message_id],
                )?;
            }

            conn.execute(
                "DELETE FROM messages
                 WHERE id = ?1 AND sender_deleted = 1 AND recipient_deleted = 1",
                params![message_id],
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
}
