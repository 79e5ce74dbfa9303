//! Connection lifecycle: admission, rooms, presence, and typing signals.
//!
//! Sequences the collaborators around the session registry: the token
//! verifier gates admission, the membership authorizer gates joins, and
//! presence transitions reported by the registry turn into process-wide
//! `userOnline`/`userOffline` events plus a last-seen write at the offline
//! transition.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::TokenVerifier;
use crate::domain::{
    ConnectionId, EventBus, PresenceTransition, RelayEvent, RoomId, SessionRegistry, UserId,
};
use crate::error::RelayError;
use crate::storage::ChatStore;

use super::membership::MembershipAuthorizer;

/// Orchestration layer for connection/session operations.
#[derive(Debug, Clone)]
pub struct SessionService {
    registry: Arc<SessionRegistry>,
    verifier: Arc<dyn TokenVerifier>,
    store: Arc<dyn ChatStore>,
    authorizer: MembershipAuthorizer,
    event_bus: EventBus,
}

impl SessionService {
    /// Creates a new `SessionService`.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        verifier: Arc<dyn TokenVerifier>,
        store: Arc<dyn ChatStore>,
        event_bus: EventBus,
    ) -> Self {
        let authorizer = MembershipAuthorizer::new(Arc::clone(&store));
        Self {
            registry,
            verifier,
            store,
            authorizer,
            event_bus,
        }
    }

    /// Returns a reference to the session registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Verifies the bearer credential and admits the connection.
    ///
    /// On the user's first live connection a `userOnline` event fires to all
    /// connections process-wide. On failure no admission state is left
    /// behind; the caller must close the connection without a response
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Unauthenticated`] for a missing or invalid
    /// token.
    pub async fn admit(
        &self,
        conn: ConnectionId,
        token: Option<&str>,
    ) -> Result<UserId, RelayError> {
        let token = token.ok_or_else(|| {
            RelayError::Unauthenticated("no token provided".to_string())
        })?;
        let user = self.verifier.verify(token).await?;

        let transition = self.registry.admit(conn, user).await;
        if transition == PresenceTransition::NowOnline {
            let _ = self.event_bus.publish(RelayEvent::user_online(user));
        }

        tracing::info!(%conn, %user, "connection admitted");
        Ok(user)
    }

    /// Removes a disconnected connection and recomputes presence.
    ///
    /// When the user's last live connection goes away, the last-seen
    /// timestamp is persisted (exactly once, at the transition) and a
    /// `userOffline` event fires. Unknown connections are a no-op.
    pub async fn disconnect(&self, conn: ConnectionId) -> Option<UserId> {
        let (user, transition) = self.registry.remove(conn).await?;

        if transition == PresenceTransition::NowOffline {
            if let Err(err) = self.store.record_last_seen(user, Utc::now()).await {
                // Presence bookkeeping must not fail a disconnect.
                tracing::warn!(error = %err, %user, "failed to record last-seen");
            }
            let _ = self.event_bus.publish(RelayEvent::user_offline(user));
        }

        tracing::info!(%conn, %user, "connection removed");
        Some(user)
    }

    /// Joins a room after a fresh membership check against storage.
    ///
    /// Idempotent: re-joining a room the connection is already in succeeds
    /// without side effects.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Unauthenticated`] for unknown connections.
    /// - [`RelayError::Forbidden`] if the user is not a member.
    /// - [`RelayError::StorageError`] on collaborator failure.
    pub async fn join_room(&self, conn: ConnectionId, room: RoomId) -> Result<(), RelayError> {
        let user = self
            .registry
            .user_of(conn)
            .await
            .ok_or_else(|| RelayError::Unauthenticated("unknown connection".to_string()))?;
        self.authorizer.ensure_member(user, room).await?;

        self.registry.join(conn, room).await;
        tracing::debug!(%conn, %user, %room, "joined room");
        Ok(())
    }

    /// Leaves a room. Leaving a room the connection was not in, or calling
    /// on an unknown connection, is a no-op.
    pub async fn leave_room(&self, conn: ConnectionId, room: RoomId) {
        if self.registry.leave(conn, room).await {
            tracing::debug!(%conn, %room, "left room");
        }
    }

    /// Broadcasts a typing signal to the other connections in the room.
    ///
    /// Gated on join state only, a cheaper and intentionally weaker check
    /// than message authorization, since typing state carries no durability
    /// risk.
    /// The originating connection never receives its own echo.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Unauthenticated`] for unknown connections.
    /// - [`RelayError::Forbidden`] if the connection has not joined `room`.
    pub async fn set_typing(
        &self,
        conn: ConnectionId,
        room: RoomId,
        is_typing: bool,
    ) -> Result<(), RelayError> {
        let user = self
            .registry
            .user_of(conn)
            .await
            .ok_or_else(|| RelayError::Unauthenticated("unknown connection".to_string()))?;
        if !self.registry.is_joined(conn, room).await {
            return Err(RelayError::Forbidden(
                "typing requires having joined the room".to_string(),
            ));
        }

        let _ = self
            .event_bus
            .publish(RelayEvent::user_typing(user, room, is_typing, conn));
        Ok(())
    }
}
