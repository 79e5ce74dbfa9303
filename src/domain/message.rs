//! Message domain model.
//!
//! A [`Message`] is the durable chat record owned by the storage
//! collaborator: the relay never assigns its identifier or timestamps.
//! [`MessageRecord`] is the wire shape broadcast to rooms and returned by
//! the REST API: the same record enriched with sender display data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MessageId, RoomId, UserId};

/// Replacement content for soft-deleted messages. The row is retained for
/// ordering and display; only its content is overwritten.
pub const TOMBSTONE: &str = "This message has been deleted";

/// Maximum accepted message content length in bytes.
pub const MAX_CONTENT_LEN: usize = 8_192;

/// Discriminated message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text message.
    #[default]
    Text,
    /// Image attachment.
    Image,
    /// Generic file attachment.
    File,
    /// Server-generated system notice.
    System,
}

impl MessageKind {
    /// Returns the kind as its storage/wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::System => "system",
        }
    }

    /// Parses a storage string back into a kind. Unknown strings fall back
    /// to [`MessageKind::Text`].
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "image" => Self::Image,
            "file" => Self::File,
            "system" => Self::System,
            _ => Self::Text,
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Identifier assigned by storage on insert.
    pub id: MessageId,
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Identity of the sender.
    pub sender_id: UserId,
    /// Message content; the tombstone string once soft-deleted.
    pub content: String,
    /// Discriminated message kind.
    pub kind: MessageKind,
    /// Attachment file name, for image/file kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Attachment URL, for image/file kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Set once the content has been edited by its sender.
    pub is_edited: bool,
    /// Set once the message has been soft-deleted.
    pub is_deleted: bool,
    /// Creation timestamp, assigned by storage.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp, assigned by storage.
    pub updated_at: DateTime<Utc>,
}

/// Sender display data attached to broadcast and API message records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    /// Sender identity.
    pub id: UserId,
    /// Display name owned by the storage collaborator.
    pub username: String,
}

/// A [`Message`] enriched with sender display data.
///
/// This is the shape clients observe: the fanout engine broadcasts it and
/// the REST API returns it, so the originator's local echo and every other
/// member's copy are byte-identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// The persisted message.
    #[serde(flatten)]
    pub message: Message,
    /// Sender display data.
    pub sender: Sender,
}

/// Input to [`crate::storage::ChatStore::insert_message`]: everything the
/// relay knows before storage assigns identity and timestamps.
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Target room.
    pub room_id: RoomId,
    /// Authenticated sender.
    pub sender_id: UserId,
    /// Validated content.
    pub content: String,
    /// Discriminated kind.
    pub kind: MessageKind,
    /// Attachment file name.
    pub file_name: Option<String>,
    /// Attachment URL.
    pub file_url: Option<String>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn sample_message() -> Message {
        Message {
            id: MessageId::new(),
            room_id: RoomId::new(),
            sender_id: UserId::new(),
            content: "hi".to_string(),
            kind: MessageKind::Text,
            file_name: None,
            file_url: None,
            is_edited: false,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn kind_round_trips_through_storage_string() {
        for kind in [
            MessageKind::Text,
            MessageKind::Image,
            MessageKind::File,
            MessageKind::System,
        ] {
            assert_eq!(MessageKind::from_str_lossy(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_kind_falls_back_to_text() {
        assert_eq!(MessageKind::from_str_lossy("carrier-pigeon"), MessageKind::Text);
    }

    #[test]
    fn record_serializes_camel_case_with_flattened_message() {
        let record = MessageRecord {
            message: sample_message(),
            sender: Sender {
                id: UserId::new(),
                username: "alice".to_string(),
            },
        };
        let json = serde_json::to_string(&record).unwrap_or_default();
        assert!(json.contains("\"roomId\""));
        assert!(json.contains("\"isEdited\""));
        assert!(json.contains("\"sender\""));
        assert!(json.contains("\"username\":\"alice\""));
        // Attachment fields are omitted when absent.
        assert!(!json.contains("fileName"));
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&MessageKind::System).unwrap_or_default();
        assert_eq!(json, "\"system\"");
    }
}
