//! Relay events broadcast through the fanout engine.
//!
//! Every observable state change produces exactly one [`RelayEvent`] with a
//! generated [`EventId`]. The per-connection delivery filter uses the id to
//! deduplicate, the scope to restrict room events to joined connections, and
//! the origin exclusion to keep typing signals from echoing to their sender.

use serde::Serialize;

use super::message::MessageRecord;
use super::{ConnectionId, EventId, RoomId, UserId};

/// One logical event, published exactly once per state change.
#[derive(Debug, Clone, Serialize)]
pub struct RelayEvent {
    /// Generated event identifier; the dedup key for delivery.
    pub id: EventId,
    /// Event payload as observed by clients.
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Client-observable payload, tagged with the wire event name.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EventPayload {
    /// A message was persisted and is now visible to the room.
    NewMessage {
        /// The stored record, enriched with sender display data.
        message: MessageRecord,
    },

    /// A message's content was edited by its sender.
    MessageUpdated {
        /// The updated record.
        message: MessageRecord,
    },

    /// A message was soft-deleted; clients replace the bubble in place.
    MessageDeleted {
        /// The tombstoned record, still addressable at its position.
        message: MessageRecord,
    },

    /// A user started or stopped typing in a room.
    UserTyping {
        /// The typing user.
        user_id: UserId,
        /// The room the signal applies to.
        room_id: RoomId,
        /// Last explicit signal; the server trusts it without a timeout.
        is_typing: bool,
        /// Originating connection, excluded from delivery. Never serialized.
        #[serde(skip)]
        origin: ConnectionId,
    },

    /// A user's live connection count went 0 to 1.
    UserOnline {
        /// The newly online user.
        user_id: UserId,
    },

    /// A user's live connection count went 1 to 0.
    UserOffline {
        /// The newly offline user.
        user_id: UserId,
    },
}

impl RelayEvent {
    /// Wraps a payload with a freshly generated [`EventId`].
    #[must_use]
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            payload,
        }
    }

    /// Event for a newly persisted message.
    #[must_use]
    pub fn new_message(message: MessageRecord) -> Self {
        Self::new(EventPayload::NewMessage { message })
    }

    /// Event for an edited message.
    #[must_use]
    pub fn message_updated(message: MessageRecord) -> Self {
        Self::new(EventPayload::MessageUpdated { message })
    }

    /// Event for a soft-deleted message.
    #[must_use]
    pub fn message_deleted(message: MessageRecord) -> Self {
        Self::new(EventPayload::MessageDeleted { message })
    }

    /// Typing signal from `origin`; the origin connection never receives it.
    #[must_use]
    pub fn user_typing(
        user_id: UserId,
        room_id: RoomId,
        is_typing: bool,
        origin: ConnectionId,
    ) -> Self {
        Self::new(EventPayload::UserTyping {
            user_id,
            room_id,
            is_typing,
            origin,
        })
    }

    /// Presence transition 0 to 1 for `user_id`.
    #[must_use]
    pub fn user_online(user_id: UserId) -> Self {
        Self::new(EventPayload::UserOnline { user_id })
    }

    /// Presence transition 1 to 0 for `user_id`.
    #[must_use]
    pub fn user_offline(user_id: UserId) -> Self {
        Self::new(EventPayload::UserOffline { user_id })
    }

    /// Returns the room this event is scoped to, or `None` for
    /// process-wide presence events.
    #[must_use]
    pub fn room_scope(&self) -> Option<RoomId> {
        match &self.payload {
            EventPayload::NewMessage { message }
            | EventPayload::MessageUpdated { message }
            | EventPayload::MessageDeleted { message } => Some(message.message.room_id),
            EventPayload::UserTyping { room_id, .. } => Some(*room_id),
            EventPayload::UserOnline { .. } | EventPayload::UserOffline { .. } => None,
        }
    }

    /// Returns the connection that must not receive this event, if any.
    ///
    /// Message events deliver to every joined connection including the
    /// originator's; only typing signals exclude their origin.
    #[must_use]
    pub fn excluded_connection(&self) -> Option<ConnectionId> {
        match &self.payload {
            EventPayload::UserTyping { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    /// Returns the wire event name as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match &self.payload {
            EventPayload::NewMessage { .. } => "newMessage",
            EventPayload::MessageUpdated { .. } => "messageUpdated",
            EventPayload::MessageDeleted { .. } => "messageDeleted",
            EventPayload::UserTyping { .. } => "userTyping",
            EventPayload::UserOnline { .. } => "userOnline",
            EventPayload::UserOffline { .. } => "userOffline",
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::message::{Message, MessageKind, Sender};
    use crate::domain::MessageId;
    use chrono::Utc;

    fn make_record(room_id: RoomId, sender_id: UserId) -> MessageRecord {
        MessageRecord {
            message: Message {
                id: MessageId::new(),
                room_id,
                sender_id,
                content: "hi".to_string(),
                kind: MessageKind::Text,
                file_name: None,
                file_url: None,
                is_edited: false,
                is_deleted: false,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            sender: Sender {
                id: sender_id,
                username: "alice".to_string(),
            },
        }
    }

    #[test]
    fn message_events_are_room_scoped_without_exclusion() {
        let room = RoomId::new();
        let event = RelayEvent::new_message(make_record(room, UserId::new()));
        assert_eq!(event.room_scope(), Some(room));
        assert_eq!(event.excluded_connection(), None);
        assert_eq!(event.event_type_str(), "newMessage");
    }

    #[test]
    fn typing_excludes_origin_connection() {
        let origin = ConnectionId::new();
        let room = RoomId::new();
        let event = RelayEvent::user_typing(UserId::new(), room, true, origin);
        assert_eq!(event.room_scope(), Some(room));
        assert_eq!(event.excluded_connection(), Some(origin));
    }

    #[test]
    fn presence_events_are_global() {
        let online = RelayEvent::user_online(UserId::new());
        let offline = RelayEvent::user_offline(UserId::new());
        assert_eq!(online.room_scope(), None);
        assert_eq!(offline.room_scope(), None);
        assert_eq!(online.event_type_str(), "userOnline");
        assert_eq!(offline.event_type_str(), "userOffline");
    }

    #[test]
    fn typing_serializes_camel_case_without_origin() {
        let event = RelayEvent::user_typing(UserId::new(), RoomId::new(), true, ConnectionId::new());
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"event\":\"userTyping\""));
        assert!(json.contains("\"userId\""));
        assert!(json.contains("\"isTyping\":true"));
        assert!(!json.contains("origin"));
    }

    #[test]
    fn each_event_gets_a_fresh_id() {
        let user = UserId::new();
        let a = RelayEvent::user_online(user);
        let b = RelayEvent::user_online(user);
        assert_ne!(a.id, b.id);
    }
}
