//! Message endpoints: room history, create, edit, soft delete.
//!
//! The create endpoint runs the same pipeline as the WebSocket
//! `sendMessage` command, so an HTTP-submitted message fans out to the room
//! exactly like a socket-submitted one.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::api::dto::{EditMessageRequest, SendMessageRequest};
use crate::api::extract::AuthUser;
use crate::app_state::AppState;
use crate::domain::{MessageId, RoomId};
use crate::error::{ErrorResponse, RelayError};

/// `GET /rooms/{room_id}/messages` — Ordered room history.
///
/// Returns messages in creation order, oldest first, with soft-deleted
/// rows included but tombstoned.
///
/// # Errors
///
/// Returns [`RelayError::Forbidden`] if the caller is not a member.
#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/messages",
    tag = "Messages",
    summary = "List room messages",
    description = "Returns every message in the room in creation order, oldest first. Requires room membership. Soft-deleted messages are included with tombstoned content.",
    params(
        ("room_id" = uuid::Uuid, Path, description = "Room UUID"),
    ),
    responses(
        (status = 200, description = "Ordered message list", body = serde_json::Value),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "Not a member of the room", body = ErrorResponse),
    )
)]
pub async fn list_room_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(room_id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, RelayError> {
    let messages = state
        .chat
        .list_room_messages(user, RoomId::from_uuid(room_id))
        .await?;
    Ok(Json(messages))
}

/// `POST /messages` — Create a message and fan it out to the room.
///
/// # Errors
///
/// Returns [`RelayError`] on validation, authorization, or storage failure.
#[utoipa::path(
    post,
    path = "/api/v1/messages",
    tag = "Messages",
    summary = "Create a message",
    description = "Validates, authorizes, persists, then broadcasts the message to every connection joined to the room. Nothing is broadcast if persistence fails.",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored and broadcast", body = serde_json::Value),
        (status = 400, description = "Invalid content", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "Not a member of the room", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn create_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let record = state
        .chat
        .submit(
            user,
            req.room_id,
            req.content,
            req.kind,
            req.file_name,
            req.file_url,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `PATCH /messages/{id}` — Edit a message's content in place.
///
/// # Errors
///
/// Returns [`RelayError::Forbidden`] unless the caller is the sender.
#[utoipa::path(
    patch,
    path = "/api/v1/messages/{id}",
    tag = "Messages",
    summary = "Edit a message",
    description = "Mutates the existing row: replaces content and sets the edited flag. Restricted to the original sender. Broadcasts a messageUpdated event to the room.",
    params(
        ("id" = uuid::Uuid, Path, description = "Message UUID"),
    ),
    request_body = EditMessageRequest,
    responses(
        (status = 200, description = "Updated record", body = serde_json::Value),
        (status = 403, description = "Caller is not the sender", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse),
    )
)]
pub async fn edit_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let record = state
        .chat
        .edit(user, MessageId::from_uuid(id), req.content)
        .await?;
    Ok(Json(record))
}

/// `DELETE /messages/{id}` — Soft-delete a message.
///
/// # Errors
///
/// Returns [`RelayError::Forbidden`] unless the caller is the sender.
#[utoipa::path(
    delete,
    path = "/api/v1/messages/{id}",
    tag = "Messages",
    summary = "Soft-delete a message",
    description = "Replaces the content with a tombstone and sets the deleted flag; the row stays addressable at its position. Broadcasts a messageDeleted event so clients replace the bubble in place.",
    params(
        ("id" = uuid::Uuid, Path, description = "Message UUID"),
    ),
    responses(
        (status = 200, description = "Tombstoned record", body = serde_json::Value),
        (status = 403, description = "Caller is not the sender", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse),
    )
)]
pub async fn delete_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, RelayError> {
    let record = state.chat.soft_delete(user, MessageId::from_uuid(id)).await?;
    Ok(Json(record))
}

/// Message routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms/{room_id}/messages", get(list_room_messages))
        .route("/messages", post(create_message))
        .route("/messages/{id}", patch(edit_message).delete(delete_message))
}
