//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::TokenVerifier;
use crate::domain::EventBus;
use crate::service::{ChatService, SessionService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Connection/session lifecycle service.
    pub sessions: Arc<SessionService>,
    /// Message pipeline service.
    pub chat: Arc<ChatService>,
    /// Event bus for WebSocket fanout subscriptions.
    pub event_bus: EventBus,
    /// Bearer credential verifier for HTTP and WebSocket auth.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Window an unauthenticated connection gets to complete the handshake.
    pub auth_handshake_timeout: Duration,
}
