//! WebSocket connection state machine.
//!
//! Runs the read/write loop for a single connection: the authentication
//! handshake (credential at upgrade time, or a first `auth` frame within the
//! handshake window), command dispatch, and filtered event delivery from the
//! fanout bus. Message submissions are spawned onto their own task so an
//! in-flight persist completes even if the connection closes mid-operation;
//! only the dead connection's own delivery is skipped.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};

use super::messages::{ClientCommand, WsMessage};
use crate::app_state::AppState;
use crate::domain::{ConnectionId, EventId, RelayEvent, UserId};
use crate::error::RelayError;

/// Capacity of the per-connection recently-delivered event log.
const DELIVERY_LOG_CAP: usize = 1024;

/// Capacity of the response channel fed by spawned submissions.
const RESPONSE_CHANNEL_CAP: usize = 64;

/// Runs the read/write loop for a single WebSocket connection.
///
/// `token` is the credential presented at upgrade time, if any. When absent,
/// the client gets one handshake window to authenticate with an `auth`
/// frame; otherwise the connection is dropped without a response payload.
pub async fn run_connection(socket: WebSocket, state: AppState, token: Option<String>) {
    let conn_id = ConnectionId::new();
    // Subscribe before admission so this connection cannot miss its own
    // user's presence transition.
    let mut event_rx = state.event_bus.subscribe();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let admitted = match token {
        Some(token) => state.sessions.admit(conn_id, Some(&token)).await,
        None => handshake(&mut ws_rx, &state, conn_id).await,
    };
    let user = match admitted {
        Ok(user) => user,
        Err(err) => {
            // Authentication failures terminate the connection with no
            // response payload.
            tracing::warn!(%conn_id, error = %err, "authentication failed, closing");
            let _ = ws_tx.close().await;
            return;
        }
    };

    if !send_connected_ack(&mut ws_tx, user).await {
        state.sessions.disconnect(conn_id).await;
        return;
    }

    let (out_tx, mut out_rx) = mpsc::channel::<WsMessage>(RESPONSE_CHANNEL_CAP);
    let mut delivered = DeliveryLog::new(DELIVERY_LOG_CAP);

    loop {
        tokio::select! {
            // Incoming frame from the client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_text_frame(&text, conn_id, &state, &out_tx).await
                            && !send_frame(&mut ws_tx, &reply).await
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            // Event from the fanout bus
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        let in_scope = match event.room_scope() {
                            Some(room) => state.sessions.registry().is_joined(conn_id, room).await,
                            None => true,
                        };
                        if delivery_allowed(&event, conn_id, in_scope, &mut delivered) {
                            let frame = WsMessage::event(&event);
                            if !send_frame(&mut ws_tx, &frame).await {
                                // Best effort: this connection's failure must
                                // not affect delivery to the others.
                                tracing::debug!(
                                    %conn_id,
                                    event = event.event_type_str(),
                                    "event delivery failed, connection closing"
                                );
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(%conn_id, lagged = n, "client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            // Deferred response from a spawned submission
            reply = out_rx.recv() => {
                if let Some(reply) = reply
                    && !send_frame(&mut ws_tx, &reply).await
                {
                    break;
                }
            }
        }
    }

    state.sessions.disconnect(conn_id).await;
    tracing::debug!(%conn_id, "ws connection closed");
}

/// Waits for an `auth` frame within the handshake window.
async fn handshake(
    ws_rx: &mut SplitStream<WebSocket>,
    state: &AppState,
    conn_id: ConnectionId,
) -> Result<UserId, RelayError> {
    let frame = tokio::time::timeout(state.auth_handshake_timeout, ws_rx.next())
        .await
        .map_err(|_| {
            RelayError::Unauthenticated("authentication handshake timed out".to_string())
        })?;

    match frame {
        Some(Ok(Message::Text(text))) => match parse_command(&text) {
            Some(ClientCommand::Auth { token }) => {
                state.sessions.admit(conn_id, Some(&token)).await
            }
            _ => Err(RelayError::Unauthenticated(
                "first frame must authenticate".to_string(),
            )),
        },
        _ => Err(RelayError::Unauthenticated(
            "connection closed during handshake".to_string(),
        )),
    }
}

async fn send_connected_ack(ws_tx: &mut SplitSink<WebSocket, Message>, user: UserId) -> bool {
    let ack = WsMessage::response(
        String::new(),
        serde_json::json!({ "connected": true, "userId": user }),
    );
    send_frame(ws_tx, &ack).await
}

async fn send_frame(ws_tx: &mut SplitSink<WebSocket, Message>, frame: &WsMessage) -> bool {
    match frame.to_json() {
        Some(json) => ws_tx.send(Message::text(json)).await.is_ok(),
        None => true,
    }
}

/// Parses a command envelope, returning `None` on malformed input.
fn parse_command(text: &str) -> Option<ClientCommand> {
    let envelope = serde_json::from_str::<WsMessage>(text).ok()?;
    serde_json::from_value(envelope.payload).ok()
}

/// Handles one text frame from an admitted client, returning an optional
/// immediate reply. Deferred replies from spawned submissions arrive through
/// `out_tx` instead.
async fn handle_text_frame(
    text: &str,
    conn_id: ConnectionId,
    state: &AppState,
    out_tx: &mpsc::Sender<WsMessage>,
) -> Option<WsMessage> {
    let Ok(envelope) = serde_json::from_str::<WsMessage>(text) else {
        let err = RelayError::InvalidRequest("malformed JSON".to_string());
        return Some(WsMessage::error(String::new(), &err));
    };
    let request_id = envelope.id.clone();
    let Ok(command) = serde_json::from_value::<ClientCommand>(envelope.payload) else {
        let err = RelayError::InvalidRequest("unknown command".to_string());
        return Some(WsMessage::error(request_id, &err));
    };

    match command {
        ClientCommand::Auth { .. } => {
            let err = RelayError::InvalidRequest("already authenticated".to_string());
            Some(WsMessage::error(request_id, &err))
        }
        ClientCommand::JoinRoom { room_id } => {
            match state.sessions.join_room(conn_id, room_id).await {
                Ok(()) => Some(WsMessage::response(
                    request_id,
                    serde_json::json!({ "joinedRoom": room_id }),
                )),
                Err(err) => Some(WsMessage::error(request_id, &err)),
            }
        }
        ClientCommand::LeaveRoom { room_id } => {
            state.sessions.leave_room(conn_id, room_id).await;
            Some(WsMessage::response(
                request_id,
                serde_json::json!({ "leftRoom": room_id }),
            ))
        }
        ClientCommand::SendMessage {
            room_id,
            content,
            kind,
            file_name,
            file_url,
        } => {
            let Some(sender) = state.sessions.registry().user_of(conn_id).await else {
                let err = RelayError::Unauthenticated("unknown connection".to_string());
                return Some(WsMessage::error(request_id, &err));
            };
            // Spawned so a disconnect mid-operation still completes the
            // persist; failures come back on the response channel, and a
            // closed channel simply skips the dead connection's reply.
            let chat = Arc::clone(&state.chat);
            let out_tx = out_tx.clone();
            tokio::spawn(async move {
                if let Err(err) = chat
                    .submit(sender, room_id, content, kind, file_name, file_url)
                    .await
                {
                    let _ = out_tx.send(WsMessage::error(request_id, &err)).await;
                }
            });
            None
        }
        ClientCommand::Typing { room_id, is_typing } => {
            match state.sessions.set_typing(conn_id, room_id, is_typing).await {
                Ok(()) => None,
                Err(err) => Some(WsMessage::error(request_id, &err)),
            }
        }
    }
}

/// Bounded log of recently delivered event ids.
///
/// The broadcast channel already hands each subscriber one copy per publish;
/// the log guards the exactly-once contract against any second delivery path
/// for the same logical event.
#[derive(Debug)]
struct DeliveryLog {
    seen: HashSet<EventId>,
    order: VecDeque<EventId>,
    capacity: usize,
}

impl DeliveryLog {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records an event id, returning `true` the first time it is seen.
    fn record(&mut self, id: EventId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity
            && let Some(evicted) = self.order.pop_front()
        {
            self.seen.remove(&evicted);
        }
        true
    }
}

/// Decides whether `event` is delivered to `conn_id`.
///
/// `in_scope` is the registry's answer for room-scoped events (`true` for
/// process-wide presence events). Exactly one delivery per connection per
/// event id; origin-excluded events never reach their originator.
fn delivery_allowed(
    event: &RelayEvent,
    conn_id: ConnectionId,
    in_scope: bool,
    delivered: &mut DeliveryLog,
) -> bool {
    if event.excluded_connection() == Some(conn_id) {
        return false;
    }
    if !in_scope {
        return false;
    }
    delivered.record(event.id)
}
