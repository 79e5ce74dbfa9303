//! WebSocket message types: envelope, commands, and frame helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MessageKind, RelayEvent, RoomId};
use crate::error::RelayError;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; the event id for server events.
    #[serde(default)]
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

impl WsMessage {
    /// Builds an event frame from a relay event. The envelope id is the
    /// event id, so clients can deduplicate on their side too.
    #[must_use]
    pub fn event(event: &RelayEvent) -> Self {
        Self {
            id: event.id.to_string(),
            msg_type: WsMessageType::Event,
            timestamp: Utc::now(),
            payload: serde_json::to_value(event).unwrap_or_default(),
        }
    }

    /// Builds a response frame echoing the request id.
    #[must_use]
    pub fn response(id: String, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type: WsMessageType::Response,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error frame carrying the relay error code and message.
    #[must_use]
    pub fn error(id: String, err: &RelayError) -> Self {
        Self {
            id,
            msg_type: WsMessageType::Error,
            timestamp: Utc::now(),
            payload: serde_json::json!({
                "code": err.error_code(),
                "message": err.to_string(),
            }),
        }
    }

    /// Serializes the frame to JSON text.
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Commands a client can send over WebSocket.
///
/// The payload of a [`WsMessageType::Command`] envelope, tagged by the
/// `command` field with camelCase names and fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "command",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientCommand {
    /// Authenticate with a bearer token. Only meaningful as the first frame
    /// of a connection that presented no credential at upgrade time.
    Auth {
        /// Bearer credential.
        token: String,
    },
    /// Join a room (idempotent; requires membership).
    JoinRoom {
        /// Target room.
        room_id: RoomId,
    },
    /// Leave a room (no-op if not joined).
    LeaveRoom {
        /// Target room.
        room_id: RoomId,
    },
    /// Submit a message to a room.
    SendMessage {
        /// Target room.
        room_id: RoomId,
        /// Message content.
        content: String,
        /// Message kind; defaults to text.
        #[serde(default)]
        kind: MessageKind,
        /// Attachment file name.
        #[serde(default)]
        file_name: Option<String>,
        /// Attachment URL.
        #[serde(default)]
        file_url: Option<String>,
    },
    /// Announce typing state to the other room members.
    Typing {
        /// Target room.
        room_id: RoomId,
        /// Whether the user is currently typing.
        is_typing: bool,
    },
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    fn parse(payload: serde_json::Value) -> Option<ClientCommand> {
        serde_json::from_value(payload).ok()
    }

    #[test]
    fn parses_join_room() {
        let room = RoomId::new();
        let cmd = parse(serde_json::json!({"command": "joinRoom", "roomId": room}));
        let Some(ClientCommand::JoinRoom { room_id }) = cmd else {
            panic!("expected joinRoom");
        };
        assert_eq!(room_id, room);
    }

    #[test]
    fn send_message_kind_defaults_to_text() {
        let cmd = parse(serde_json::json!({
            "command": "sendMessage",
            "roomId": RoomId::new(),
            "content": "hi",
        }));
        let Some(ClientCommand::SendMessage { kind, file_name, .. }) = cmd else {
            panic!("expected sendMessage");
        };
        assert_eq!(kind, MessageKind::Text);
        assert!(file_name.is_none());
    }

    #[test]
    fn parses_typing_flags() {
        let cmd = parse(serde_json::json!({
            "command": "typing",
            "roomId": RoomId::new(),
            "isTyping": false,
        }));
        let Some(ClientCommand::Typing { is_typing, .. }) = cmd else {
            panic!("expected typing");
        };
        assert!(!is_typing);
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(parse(serde_json::json!({"command": "teleport"})).is_none());
    }

    #[test]
    fn event_frame_carries_event_id_and_name() {
        let event = RelayEvent::user_online(UserId::new());
        let frame = WsMessage::event(&event);
        assert_eq!(frame.id, event.id.to_string());
        assert_eq!(frame.msg_type, WsMessageType::Event);
        let json = frame.to_json().unwrap_or_default();
        assert!(json.contains("\"event\":\"userOnline\""));
    }

    #[test]
    fn error_frame_embeds_relay_error_code() {
        let err = RelayError::Forbidden("not a member of this room".to_string());
        let frame = WsMessage::error("req-1".to_string(), &err);
        let json = frame.to_json().unwrap_or_default();
        assert!(json.contains("\"code\":2002"));
        assert!(json.contains("not a member"));
    }
}
