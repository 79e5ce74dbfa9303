//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;

/// Query parameters accepted by the WebSocket endpoint.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Bearer credential presented at upgrade time.
    pub token: Option<String>,
}

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The bearer credential may arrive as a `token` query parameter or an
/// `Authorization: Bearer` header; with neither, the client gets one
/// handshake window to authenticate with an `auth` frame.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let token = params.token.or_else(|| bearer_from_headers(&headers));
    ws.on_upgrade(move |socket| run_connection(socket, state, token))
}

/// Extracts a bearer token from the `Authorization` header.
fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}
