//! DTOs for the message endpoints.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{MessageKind, RoomId};

/// Request body for `POST /api/v1/messages`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Target room.
    #[schema(value_type = uuid::Uuid)]
    pub room_id: RoomId,
    /// Message content.
    pub content: String,
    /// Message kind; defaults to `text`.
    #[serde(default)]
    #[schema(value_type = String, example = "text")]
    pub kind: MessageKind,
    /// Attachment file name, for image/file kinds.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Attachment URL, for image/file kinds.
    #[serde(default)]
    pub file_url: Option<String>,
}

/// Request body for `PATCH /api/v1/messages/{id}`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    /// Replacement content.
    pub content: String,
}
