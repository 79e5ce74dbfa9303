//! Message pipeline: validate, authorize, persist, then fan out.
//!
//! Every message follows the same lifecycle: content validation, a fresh
//! membership check, persistence (storage assigns identity and timestamps),
//! a re-fetch enriched with sender display data, and exactly one broadcast.
//! A storage failure stops the pipeline before any broadcast, so every
//! message a client ever observes is retrievable from storage afterwards.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::message::{MAX_CONTENT_LEN, TOMBSTONE};
use crate::domain::{EventBus, MessageId, MessageKind, MessageRecord, NewMessage, RelayEvent, RoomId, UserId};
use crate::error::RelayError;
use crate::storage::ChatStore;

use super::membership::MembershipAuthorizer;

/// Orchestration layer for message operations.
///
/// Stateless coordinator: owns references to the storage collaborator and
/// the [`EventBus`]. Every mutation follows the pattern: authorize against
/// storage, persist, re-fetch with sender data, emit exactly one event.
#[derive(Debug, Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    authorizer: MembershipAuthorizer,
    event_bus: EventBus,
}

impl ChatService {
    /// Creates a new `ChatService`.
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>, event_bus: EventBus) -> Self {
        let authorizer = MembershipAuthorizer::new(Arc::clone(&store));
        Self {
            store,
            authorizer,
            event_bus,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Submits a new message to a room on behalf of `sender`.
    ///
    /// The `newMessage` event is published only after the row is durably
    /// stored, and exactly once; the sender's own connection receives the
    /// same fanout copy as everyone else, so its local echo is authoritative.
    ///
    /// # Errors
    ///
    /// - [`RelayError::InvalidRequest`] for empty or oversized content.
    /// - [`RelayError::Forbidden`] if `sender` is not a member of `room`.
    /// - [`RelayError::StorageError`] if persistence fails; nothing is
    ///   broadcast in that case.
    pub async fn submit(
        &self,
        sender: UserId,
        room: RoomId,
        content: String,
        kind: MessageKind,
        file_name: Option<String>,
        file_url: Option<String>,
    ) -> Result<MessageRecord, RelayError> {
        validate_content(&content)?;
        self.authorizer.ensure_member(sender, room).await?;

        let message = self
            .store
            .insert_message(NewMessage {
                room_id: room,
                sender_id: sender,
                content,
                kind,
                file_name,
                file_url,
            })
            .await?;

        let record = self.fetch_record(message.id).await?;
        let _ = self.event_bus.publish(RelayEvent::new_message(record.clone()));

        tracing::info!(message_id = %message.id, %room, %sender, "message stored and broadcast");
        Ok(record)
    }

    /// Edits a message's content in place.
    ///
    /// Only the original sender may edit; the row keeps its identity and
    /// position and a `messageUpdated` event is broadcast to the room.
    ///
    /// # Errors
    ///
    /// - [`RelayError::NotFound`] if the message does not exist.
    /// - [`RelayError::Forbidden`] if `requester` is not the sender.
    /// - [`RelayError::InvalidRequest`] for empty or oversized content.
    /// - [`RelayError::StorageError`] on persistence failure.
    pub async fn edit(
        &self,
        requester: UserId,
        message_id: MessageId,
        content: String,
    ) -> Result<MessageRecord, RelayError> {
        validate_content(&content)?;

        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or_else(|| RelayError::NotFound(format!("message {message_id}")))?;
        if message.sender_id != requester {
            return Err(RelayError::Forbidden(
                "only the sender can edit a message".to_string(),
            ));
        }

        let updated = self.store.mark_edited(message_id, &content).await?;
        let record = self.fetch_record(updated.id).await?;
        let _ = self
            .event_bus
            .publish(RelayEvent::message_updated(record.clone()));

        tracing::info!(%message_id, %requester, "message edited");
        Ok(record)
    }

    /// Soft-deletes a message: content becomes the tombstone string, the
    /// deleted flag is set, and the row is retained at its position.
    ///
    /// A `messageDeleted` event (not a raw removal) is broadcast so clients
    /// can replace the bubble in place.
    ///
    /// # Errors
    ///
    /// - [`RelayError::NotFound`] if the message does not exist.
    /// - [`RelayError::Forbidden`] if `requester` is not the sender.
    /// - [`RelayError::StorageError`] on persistence failure.
    pub async fn soft_delete(
        &self,
        requester: UserId,
        message_id: MessageId,
    ) -> Result<MessageRecord, RelayError> {
        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or_else(|| RelayError::NotFound(format!("message {message_id}")))?;
        if message.sender_id != requester {
            return Err(RelayError::Forbidden(
                "only the sender can delete a message".to_string(),
            ));
        }

        let deleted = self.store.mark_deleted(message_id, TOMBSTONE).await?;
        let record = self.fetch_record(deleted.id).await?;
        let _ = self
            .event_bus
            .publish(RelayEvent::message_deleted(record.clone()));

        tracing::info!(%message_id, %requester, "message soft-deleted");
        Ok(record)
    }

    /// Returns every message in `room` in creation order, oldest first.
    ///
    /// Soft-deleted messages are included, tombstoned, at their original
    /// positions. Requires the same membership check as writes.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Forbidden`] if `requester` is not a member.
    /// - [`RelayError::StorageError`] on collaborator failure.
    pub async fn list_room_messages(
        &self,
        requester: UserId,
        room: RoomId,
    ) -> Result<Vec<MessageRecord>, RelayError> {
        self.authorizer.ensure_member(requester, room).await?;
        self.store.room_messages(room).await
    }

    /// Records the moment a user went offline. Failures are surfaced to the
    /// caller, which logs rather than propagates: presence bookkeeping must
    /// not fail a disconnect.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::StorageError`] on collaborator failure.
    pub async fn record_last_seen(&self, user: UserId) -> Result<(), RelayError> {
        self.store.record_last_seen(user, Utc::now()).await
    }

    async fn fetch_record(&self, id: MessageId) -> Result<MessageRecord, RelayError> {
        self.store
            .find_message_with_sender(id)
            .await?
            .ok_or_else(|| RelayError::Internal(format!("stored message {id} missing on re-fetch")))
    }
}

fn validate_content(content: &str) -> Result<(), RelayError> {
    if content.trim().is_empty() {
        return Err(RelayError::InvalidRequest(
            "message content must not be empty".to_string(),
        ));
    }
    if content.len() > MAX_CONTENT_LEN {
        return Err(RelayError::InvalidRequest(format!(
            "message content exceeds {MAX_CONTENT_LEN} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::EventPayload;
    use crate::storage::memory::MemoryStore;
    use async_trait::async_trait;
    use tokio::sync::broadcast::error::TryRecvError;

    struct Fixture {
        service: ChatService,
        store: Arc<MemoryStore>,
        user: UserId,
        room: RoomId,
    }

    async fn make_fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::new();
        let room = RoomId::new();
        store.add_user(user, "alice").await;
        store.add_member(user, room).await;
        let service = ChatService::new(
            Arc::clone(&store) as Arc<dyn ChatStore>,
            EventBus::new(100),
        );
        Fixture {
            service,
            store,
            user,
            room,
        }
    }

    #[tokio::test]
    async fn submit_round_trip_reaches_every_subscriber_once() {
        let fx = make_fixture().await;
        let mut rx_a = fx.service.event_bus().subscribe();
        let mut rx_b = fx.service.event_bus().subscribe();

        let result = fx
            .service
            .submit(fx.user, fx.room, "hi".to_string(), MessageKind::Text, None, None)
            .await;
        let Ok(record) = result else {
            panic!("submit failed");
        };
        assert_eq!(record.message.content, "hi");
        assert_eq!(record.message.kind, MessageKind::Text);
        assert_eq!(record.message.sender_id, fx.user);
        assert_eq!(record.sender.username, "alice");
        assert!(!record.message.is_edited);
        assert!(!record.message.is_deleted);

        for rx in [&mut rx_a, &mut rx_b] {
            let Ok(event) = rx.recv().await else {
                panic!("subscriber missed the event");
            };
            assert_eq!(event.event_type_str(), "newMessage");
            let EventPayload::NewMessage { message } = &event.payload else {
                panic!("wrong payload");
            };
            assert_eq!(message.message.id, record.message.id);
            assert_eq!(message.message.content, "hi");
            // Exactly one event per broadcast call.
            assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        }
    }

    #[tokio::test]
    async fn non_member_submit_is_forbidden_and_silent() {
        let fx = make_fixture().await;
        let outsider = UserId::new();
        let mut rx = fx.service.event_bus().subscribe();

        let result = fx
            .service
            .submit(outsider, fx.room, "hi".to_string(), MessageKind::Text, None, None)
            .await;
        assert!(matches!(result, Err(RelayError::Forbidden(_))));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn membership_granted_mid_session_is_effective_next_call() {
        let fx = make_fixture().await;
        let newcomer = UserId::new();
        fx.store.add_user(newcomer, "bob").await;

        let first = fx
            .service
            .submit(newcomer, fx.room, "hi".to_string(), MessageKind::Text, None, None)
            .await;
        assert!(matches!(first, Err(RelayError::Forbidden(_))));

        fx.store.add_member(newcomer, fx.room).await;
        let second = fx
            .service
            .submit(newcomer, fx.room, "hi".to_string(), MessageKind::Text, None, None)
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let fx = make_fixture().await;
        let result = fx
            .service
            .submit(fx.user, fx.room, "   ".to_string(), MessageKind::Text, None, None)
            .await;
        assert!(matches!(result, Err(RelayError::InvalidRequest(_))));
    }

    #[derive(Debug)]
    struct FailingStore;

    #[async_trait]
    impl ChatStore for FailingStore {
        async fn is_member(&self, _: UserId, _: RoomId) -> Result<bool, RelayError> {
            Ok(true)
        }
        async fn insert_message(
            &self,
            _: NewMessage,
        ) -> Result<crate::domain::Message, RelayError> {
            Err(RelayError::StorageError("disk on fire".to_string()))
        }
        async fn find_message(
            &self,
            _: MessageId,
        ) -> Result<Option<crate::domain::Message>, RelayError> {
            Err(RelayError::StorageError("disk on fire".to_string()))
        }
        async fn find_message_with_sender(
            &self,
            _: MessageId,
        ) -> Result<Option<MessageRecord>, RelayError> {
            Err(RelayError::StorageError("disk on fire".to_string()))
        }
        async fn room_messages(&self, _: RoomId) -> Result<Vec<MessageRecord>, RelayError> {
            Err(RelayError::StorageError("disk on fire".to_string()))
        }
        async fn mark_edited(
            &self,
            _: MessageId,
            _: &str,
        ) -> Result<crate::domain::Message, RelayError> {
            Err(RelayError::StorageError("disk on fire".to_string()))
        }
        async fn mark_deleted(
            &self,
            _: MessageId,
            _: &str,
        ) -> Result<crate::domain::Message, RelayError> {
            Err(RelayError::StorageError("disk on fire".to_string()))
        }
        async fn record_last_seen(
            &self,
            _: UserId,
            _: chrono::DateTime<Utc>,
        ) -> Result<(), RelayError> {
            Err(RelayError::StorageError("disk on fire".to_string()))
        }
    }

    #[tokio::test]
    async fn storage_failure_aborts_before_broadcast() {
        let service = ChatService::new(Arc::new(FailingStore), EventBus::new(100));
        let mut rx = service.event_bus().subscribe();

        let result = service
            .submit(
                UserId::new(),
                RoomId::new(),
                "hi".to_string(),
                MessageKind::Text,
                None,
                None,
            )
            .await;
        assert!(matches!(result, Err(RelayError::StorageError(_))));
        // Partial visibility is a disallowed state: nothing was broadcast.
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn edit_is_sender_only_and_idempotent() {
        let fx = make_fixture().await;
        let Ok(record) = fx
            .service
            .submit(fx.user, fx.room, "draft".to_string(), MessageKind::Text, None, None)
            .await
        else {
            panic!("submit failed");
        };
        let id = record.message.id;

        let stranger = UserId::new();
        let denied = fx.service.edit(stranger, id, "hijack".to_string()).await;
        assert!(matches!(denied, Err(RelayError::Forbidden(_))));

        let Ok(first) = fx.service.edit(fx.user, id, "final".to_string()).await else {
            panic!("edit failed");
        };
        assert_eq!(first.message.content, "final");
        assert!(first.message.is_edited);

        // Editing again with the same content leaves content and flag alone.
        let Ok(second) = fx.service.edit(fx.user, id, "final".to_string()).await else {
            panic!("second edit failed");
        };
        assert_eq!(second.message.content, "final");
        assert!(second.message.is_edited);
    }

    #[tokio::test]
    async fn edit_missing_message_is_not_found() {
        let fx = make_fixture().await;
        let result = fx
            .service
            .edit(fx.user, MessageId::new(), "anything".to_string())
            .await;
        assert!(matches!(result, Err(RelayError::NotFound(_))));
    }

    #[tokio::test]
    async fn soft_delete_tombstones_in_place_and_broadcasts() {
        let fx = make_fixture().await;
        let Ok(first) = fx
            .service
            .submit(fx.user, fx.room, "first".to_string(), MessageKind::Text, None, None)
            .await
        else {
            panic!("submit failed");
        };
        let Ok(_) = fx
            .service
            .submit(fx.user, fx.room, "second".to_string(), MessageKind::Text, None, None)
            .await
        else {
            panic!("submit failed");
        };

        let mut rx = fx.service.event_bus().subscribe();
        let Ok(deleted) = fx.service.soft_delete(fx.user, first.message.id).await else {
            panic!("delete failed");
        };
        assert_eq!(deleted.message.content, TOMBSTONE);
        assert!(deleted.message.is_deleted);

        let Ok(event) = rx.recv().await else {
            panic!("no delete event");
        };
        assert_eq!(event.event_type_str(), "messageDeleted");

        let Ok(listing) = fx.service.list_room_messages(fx.user, fx.room).await else {
            panic!("listing failed");
        };
        assert_eq!(listing.len(), 2);
        let Some(head) = listing.first() else {
            panic!("expected two messages");
        };
        assert_eq!(head.message.id, first.message.id);
        assert_eq!(head.message.content, TOMBSTONE);
        assert!(head.message.is_deleted);
    }

    #[tokio::test]
    async fn listing_requires_membership() {
        let fx = make_fixture().await;
        let outsider = UserId::new();
        let result = fx.service.list_room_messages(outsider, fx.room).await;
        assert!(matches!(result, Err(RelayError::Forbidden(_))));
    }
}
