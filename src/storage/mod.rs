//! Storage collaborator: durable users, rooms, memberships, and messages.
//!
//! The relay never owns this data. It reads membership, inserts and mutates
//! message rows, and records last-seen timestamps through the [`ChatStore`]
//! trait; everything else about persistence (schema ownership, room/user
//! CRUD, credential storage) belongs to the surrounding system. The
//! concrete implementation is [`postgres::PostgresStore`];
//! [`memory::MemoryStore`] implements the same trait for tests and local
//! development.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Message, MessageId, MessageRecord, NewMessage, RoomId, UserId};
use crate::error::RelayError;

/// Durable-store operations the relay depends on.
///
/// Membership reads are authoritative and re-checked on every privileged
/// operation; implementations must not cache them across calls.
#[async_trait]
pub trait ChatStore: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `user` belongs to `room`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::StorageError`] on collaborator failure.
    async fn is_member(&self, user: UserId, room: RoomId) -> Result<bool, RelayError>;

    /// Persists a new message. Storage assigns identity and timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::StorageError`] on collaborator failure.
    async fn insert_message(&self, new: NewMessage) -> Result<Message, RelayError>;

    /// Fetches a message row by id.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::StorageError`] on collaborator failure.
    async fn find_message(&self, id: MessageId) -> Result<Option<Message>, RelayError>;

    /// Fetches a message enriched with sender display data.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::StorageError`] on collaborator failure.
    async fn find_message_with_sender(
        &self,
        id: MessageId,
    ) -> Result<Option<MessageRecord>, RelayError>;

    /// Returns every message in `room` in creation order, oldest first,
    /// soft-deleted rows included.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::StorageError`] on collaborator failure.
    async fn room_messages(&self, room: RoomId) -> Result<Vec<MessageRecord>, RelayError>;

    /// Overwrites a message's content and sets its edited flag, mutating
    /// the existing row in place.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] if the row is absent, or
    /// [`RelayError::StorageError`] on collaborator failure.
    async fn mark_edited(&self, id: MessageId, content: &str) -> Result<Message, RelayError>;

    /// Replaces a message's content with the tombstone and sets its deleted
    /// flag. The row is retained, never physically removed.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] if the row is absent, or
    /// [`RelayError::StorageError`] on collaborator failure.
    async fn mark_deleted(&self, id: MessageId, tombstone: &str) -> Result<Message, RelayError>;

    /// Persists a user's last-seen timestamp at the offline transition.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::StorageError`] on collaborator failure.
    async fn record_last_seen(&self, user: UserId, at: DateTime<Utc>) -> Result<(), RelayError>;
}
