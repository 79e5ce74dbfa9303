//! PostgreSQL implementation of the storage collaborator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    Message, MessageId, MessageKind, MessageRecord, NewMessage, RoomId, Sender, UserId,
};
use crate::error::RelayError;

use super::ChatStore;

/// Message row tuple as selected from the `messages` table.
type MessageRow = (
    Uuid,
    Uuid,
    Uuid,
    String,
    String,
    Option<String>,
    Option<String>,
    bool,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

/// Message row joined with the sender's username.
type MessageSenderRow = (
    Uuid,
    Uuid,
    Uuid,
    String,
    String,
    Option<String>,
    Option<String>,
    bool,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
    String,
);

const MESSAGE_COLUMNS: &str = "id, room_id, sender_id, content, kind, file_name, file_url, \
     is_edited, is_deleted, created_at, updated_at";

/// PostgreSQL-backed storage using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn message_from_row(row: MessageRow) -> Message {
    let (
        id,
        room_id,
        sender_id,
        content,
        kind,
        file_name,
        file_url,
        is_edited,
        is_deleted,
        created_at,
        updated_at,
    ) = row;
    Message {
        id: MessageId::from_uuid(id),
        room_id: RoomId::from_uuid(room_id),
        sender_id: UserId::from_uuid(sender_id),
        content,
        kind: MessageKind::from_str_lossy(&kind),
        file_name,
        file_url,
        is_edited,
        is_deleted,
        created_at,
        updated_at,
    }
}

fn record_from_row(row: MessageSenderRow) -> MessageRecord {
    let (
        id,
        room_id,
        sender_id,
        content,
        kind,
        file_name,
        file_url,
        is_edited,
        is_deleted,
        created_at,
        updated_at,
        username,
    ) = row;
    MessageRecord {
        message: message_from_row((
            id, room_id, sender_id, content, kind, file_name, file_url, is_edited, is_deleted,
            created_at, updated_at,
        )),
        sender: Sender {
            id: UserId::from_uuid(sender_id),
            username,
        },
    }
}

#[async_trait]
impl ChatStore for PostgresStore {
    async fn is_member(&self, user: UserId, room: RoomId) -> Result<bool, RelayError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM room_members WHERE room_id = $1 AND user_id = $2)",
        )
        .bind(room.as_uuid())
        .bind(user.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RelayError::StorageError(e.to_string()))
    }

    async fn insert_message(&self, new: NewMessage) -> Result<Message, RelayError> {
        let sql = format!(
            "INSERT INTO messages (room_id, sender_id, content, kind, file_name, file_url) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {MESSAGE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(new.room_id.as_uuid())
            .bind(new.sender_id.as_uuid())
            .bind(&new.content)
            .bind(new.kind.as_str())
            .bind(&new.file_name)
            .bind(&new.file_url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RelayError::StorageError(e.to_string()))?;

        Ok(message_from_row(row))
    }

    async fn find_message(&self, id: MessageId) -> Result<Option<Message>, RelayError> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RelayError::StorageError(e.to_string()))?;

        Ok(row.map(message_from_row))
    }

    async fn find_message_with_sender(
        &self,
        id: MessageId,
    ) -> Result<Option<MessageRecord>, RelayError> {
        let row = sqlx::query_as::<_, MessageSenderRow>(
            "SELECT m.id, m.room_id, m.sender_id, m.content, m.kind, m.file_name, m.file_url, \
             m.is_edited, m.is_deleted, m.created_at, m.updated_at, u.username \
             FROM messages m JOIN users u ON u.id = m.sender_id WHERE m.id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RelayError::StorageError(e.to_string()))?;

        Ok(row.map(record_from_row))
    }

    async fn room_messages(&self, room: RoomId) -> Result<Vec<MessageRecord>, RelayError> {
        let rows = sqlx::query_as::<_, MessageSenderRow>(
            "SELECT m.id, m.room_id, m.sender_id, m.content, m.kind, m.file_name, m.file_url, \
             m.is_edited, m.is_deleted, m.created_at, m.updated_at, u.username \
             FROM messages m JOIN users u ON u.id = m.sender_id \
             WHERE m.room_id = $1 ORDER BY m.created_at ASC",
        )
        .bind(room.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayError::StorageError(e.to_string()))?;

        Ok(rows.into_iter().map(record_from_row).collect())
    }

    async fn mark_edited(&self, id: MessageId, content: &str) -> Result<Message, RelayError> {
        let sql = format!(
            "UPDATE messages SET content = $2, is_edited = TRUE, updated_at = NOW() \
             WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id.as_uuid())
            .bind(content)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RelayError::StorageError(e.to_string()))?;

        row.map(message_from_row)
            .ok_or_else(|| RelayError::NotFound(format!("message {id}")))
    }

    async fn mark_deleted(&self, id: MessageId, tombstone: &str) -> Result<Message, RelayError> {
        let sql = format!(
            "UPDATE messages SET content = $2, is_deleted = TRUE, updated_at = NOW() \
             WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id.as_uuid())
            .bind(tombstone)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RelayError::StorageError(e.to_string()))?;

        row.map(message_from_row)
            .ok_or_else(|| RelayError::NotFound(format!("message {id}")))
    }

    async fn record_last_seen(&self, user: UserId, at: DateTime<Utc>) -> Result<(), RelayError> {
        sqlx::query("UPDATE users SET last_seen_at = $2 WHERE id = $1")
            .bind(user.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| RelayError::StorageError(e.to_string()))?;

        Ok(())
    }
}
