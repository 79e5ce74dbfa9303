//! In-memory implementation of the storage collaborator.
//!
//! Backs the test suites and local development runs. Messages are kept in
//! insertion order, which doubles as creation order since this store is the
//! one assigning timestamps.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{
    Message, MessageId, MessageRecord, NewMessage, RoomId, Sender, UserId,
};
use crate::error::RelayError;

use super::ChatStore;

#[derive(Debug, Default)]
struct MemoryInner {
    users: HashMap<UserId, String>,
    members: HashSet<(UserId, RoomId)>,
    messages: Vec<Message>,
    last_seen: HashMap<UserId, DateTime<Utc>>,
}

/// In-memory [`ChatStore`] with membership and user fixtures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user with a display name.
    pub async fn add_user(&self, user: UserId, username: &str) {
        self.inner
            .write()
            .await
            .users
            .insert(user, username.to_string());
    }

    /// Grants `user` membership of `room`.
    pub async fn add_member(&self, user: UserId, room: RoomId) {
        self.inner.write().await.members.insert((user, room));
    }

    /// Revokes `user`'s membership of `room`.
    pub async fn remove_member(&self, user: UserId, room: RoomId) {
        self.inner.write().await.members.remove(&(user, room));
    }

    /// Returns the recorded last-seen timestamp for `user`, if any.
    pub async fn last_seen_of(&self, user: UserId) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_seen.get(&user).copied()
    }

    fn sender_for(inner: &MemoryInner, user: UserId) -> Sender {
        Sender {
            id: user,
            username: inner
                .users
                .get(&user)
                .cloned()
                .unwrap_or_else(|| user.to_string()),
        }
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn is_member(&self, user: UserId, room: RoomId) -> Result<bool, RelayError> {
        Ok(self.inner.read().await.members.contains(&(user, room)))
    }

    async fn insert_message(&self, new: NewMessage) -> Result<Message, RelayError> {
        let now = Utc::now();
        let message = Message {
            id: MessageId::new(),
            room_id: new.room_id,
            sender_id: new.sender_id,
            content: new.content,
            kind: new.kind,
            file_name: new.file_name,
            file_url: new.file_url,
            is_edited: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.inner.write().await.messages.push(message.clone());
        Ok(message)
    }

    async fn find_message(&self, id: MessageId) -> Result<Option<Message>, RelayError> {
        Ok(self
            .inner
            .read()
            .await
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn find_message_with_sender(
        &self,
        id: MessageId,
    ) -> Result<Option<MessageRecord>, RelayError> {
        let inner = self.inner.read().await;
        Ok(inner.messages.iter().find(|m| m.id == id).map(|m| {
            MessageRecord {
                message: m.clone(),
                sender: Self::sender_for(&inner, m.sender_id),
            }
        }))
    }

    async fn room_messages(&self, room: RoomId) -> Result<Vec<MessageRecord>, RelayError> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.room_id == room)
            .map(|m| MessageRecord {
                message: m.clone(),
                sender: Self::sender_for(&inner, m.sender_id),
            })
            .collect())
    }

    async fn mark_edited(&self, id: MessageId, content: &str) -> Result<Message, RelayError> {
        let mut inner = self.inner.write().await;
        let message = inner
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| RelayError::NotFound(format!("message {id}")))?;
        message.content = content.to_string();
        message.is_edited = true;
        message.updated_at = Utc::now();
        Ok(message.clone())
    }

    async fn mark_deleted(&self, id: MessageId, tombstone: &str) -> Result<Message, RelayError> {
        let mut inner = self.inner.write().await;
        let message = inner
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| RelayError::NotFound(format!("message {id}")))?;
        message.content = tombstone.to_string();
        message.is_deleted = true;
        message.updated_at = Utc::now();
        Ok(message.clone())
    }

    async fn record_last_seen(&self, user: UserId, at: DateTime<Utc>) -> Result<(), RelayError> {
        self.inner.write().await.last_seen.insert(user, at);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::MessageKind;

    fn new_message(room: RoomId, sender: UserId, content: &str) -> NewMessage {
        NewMessage {
            room_id: room,
            sender_id: sender,
            content: content.to_string(),
            kind: MessageKind::Text,
            file_name: None,
            file_url: None,
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let store = MemoryStore::new();
        let result = store
            .insert_message(new_message(RoomId::new(), UserId::new(), "hi"))
            .await;
        let Ok(message) = result else {
            panic!("insert failed");
        };
        assert!(!message.is_edited);
        assert!(!message.is_deleted);
        assert_eq!(message.created_at, message.updated_at);
    }

    #[tokio::test]
    async fn room_messages_preserve_creation_order() {
        let store = MemoryStore::new();
        let room = RoomId::new();
        let sender = UserId::new();
        store.add_user(sender, "alice").await;
        for content in ["one", "two", "three"] {
            let _ = store.insert_message(new_message(room, sender, content)).await;
        }
        // A message in another room must not leak in.
        let _ = store
            .insert_message(new_message(RoomId::new(), sender, "elsewhere"))
            .await;

        let Ok(records) = store.room_messages(room).await else {
            panic!("listing failed");
        };
        let contents: Vec<&str> = records.iter().map(|r| r.message.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert!(records.iter().all(|r| r.sender.username == "alice"));
    }

    #[tokio::test]
    async fn tombstoned_message_keeps_its_position() {
        let store = MemoryStore::new();
        let room = RoomId::new();
        let sender = UserId::new();
        let Ok(first) = store.insert_message(new_message(room, sender, "first")).await else {
            panic!("insert failed");
        };
        let _ = store.insert_message(new_message(room, sender, "second")).await;

        let Ok(deleted) = store.mark_deleted(first.id, "gone").await else {
            panic!("delete failed");
        };
        assert!(deleted.is_deleted);

        let Ok(records) = store.room_messages(room).await else {
            panic!("listing failed");
        };
        assert_eq!(records.len(), 2);
        let Some(head) = records.first() else {
            panic!("expected two records");
        };
        assert_eq!(head.message.id, first.id);
        assert_eq!(head.message.content, "gone");
        assert!(head.message.is_deleted);
    }

    #[tokio::test]
    async fn membership_can_be_granted_and_revoked() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let room = RoomId::new();

        assert_eq!(store.is_member(user, room).await.ok(), Some(false));
        store.add_member(user, room).await;
        assert_eq!(store.is_member(user, room).await.ok(), Some(true));
        store.remove_member(user, room).await;
        assert_eq!(store.is_member(user, room).await.ok(), Some(false));
    }

    #[tokio::test]
    async fn mark_edited_on_missing_row_is_not_found() {
        let store = MemoryStore::new();
        let result = store.mark_edited(MessageId::new(), "new").await;
        assert!(matches!(result, Err(RelayError::NotFound(_))));
    }

    #[tokio::test]
    async fn last_seen_is_recorded() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let at = Utc::now();
        assert!(store.record_last_seen(user, at).await.is_ok());
        assert_eq!(store.last_seen_of(user).await, Some(at));
    }
}
