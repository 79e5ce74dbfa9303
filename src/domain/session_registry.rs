//! Session registry: the relay's single source of truth for live connections.
//!
//! Maps each admitted connection to its authenticated user identity and the
//! set of rooms it has joined, and maintains the inverse room-to-connections
//! fanout index plus per-user presence counts. All three views mutate under
//! one `RwLock` write guard, so a concurrent broadcast can never observe a
//! connection in the registry but missing from the fanout index or vice
//! versa.
//!
//! # Concurrency
//!
//! - `admit` / `join` / `leave` / `remove` serialize through the write lock.
//! - Broadcast-path reads (`is_joined`, `room_connections`) take a
//!   consistent snapshot under the read lock.
//! - All operations except `admit` are no-ops for unknown connections.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use super::presence::{PresenceCounts, PresenceTransition};
use super::{ConnectionId, RoomId, UserId};

/// Registry entry for one live connection.
#[derive(Debug)]
struct ConnectionEntry {
    /// Authenticated identity, set exactly once at admission.
    user: UserId,
    /// Rooms this connection has joined.
    rooms: HashSet<RoomId>,
}

/// The shared mutable state behind the single critical section.
#[derive(Debug, Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    /// Fanout target set: room to connections currently joined. A connection
    /// appears here if and only if the room is in its entry's joined set.
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
    presence: PresenceCounts,
}

/// Connection/session bookkeeping for the whole relay process.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an authenticated connection with an empty joined-room set.
    ///
    /// The caller has already verified the bearer credential; admission here
    /// cannot fail. Returns the presence transition so the caller can fire
    /// `userOnline` when the user's first connection arrives.
    pub async fn admit(&self, conn: ConnectionId, user: UserId) -> PresenceTransition {
        let mut inner = self.inner.write().await;
        if inner.connections.contains_key(&conn) {
            // Connection ids are minted per transport session, so a second
            // admit for a live id is a bookkeeping bug. Leave state untouched.
            tracing::error!(%conn, %user, "connection admitted twice");
            return PresenceTransition::Unchanged;
        }
        inner.connections.insert(
            conn,
            ConnectionEntry {
                user,
                rooms: HashSet::new(),
            },
        );
        inner.presence.increment(user)
    }

    /// Adds `room` to the connection's joined set and the fanout index.
    ///
    /// Duplicate joins are a no-op, not an error: a client may legitimately
    /// re-join a room it is already in, e.g. on reconnection. Returns `false`
    /// for unknown connections.
    pub async fn join(&self, conn: ConnectionId, room: RoomId) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.connections.get_mut(&conn) else {
            return false;
        };
        entry.rooms.insert(room);
        inner.rooms.entry(room).or_default().insert(conn);
        true
    }

    /// Removes `room` from the connection's joined set and the fanout index.
    ///
    /// Leaving a room the connection was not in is a no-op. Returns `false`
    /// for unknown connections.
    pub async fn leave(&self, conn: ConnectionId, room: RoomId) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.connections.get_mut(&conn) else {
            return false;
        };
        entry.rooms.remove(&room);
        if let Some(members) = inner.rooms.get_mut(&room) {
            members.remove(&conn);
            if members.is_empty() {
                inner.rooms.remove(&room);
            }
        }
        true
    }

    /// Purges a connection from the registry and from every room it joined.
    ///
    /// Returns the identity that was associated plus the presence transition
    /// for `userOffline` recomputation, or `None` for unknown connections.
    pub async fn remove(&self, conn: ConnectionId) -> Option<(UserId, PresenceTransition)> {
        let mut inner = self.inner.write().await;
        let entry = inner.connections.remove(&conn)?;
        for room in &entry.rooms {
            if let Some(members) = inner.rooms.get_mut(room) {
                members.remove(&conn);
                if members.is_empty() {
                    inner.rooms.remove(room);
                }
            }
        }
        let transition = match inner.presence.decrement(entry.user) {
            Ok(transition) => transition,
            Err(err) => {
                // Registry and presence mutate under the same lock, so this
                // cannot happen unless the bookkeeping itself is broken.
                tracing::error!(error = %err, %conn, "presence count underflow");
                PresenceTransition::Unchanged
            }
        };
        Some((entry.user, transition))
    }

    /// Returns the authenticated identity behind a connection.
    pub async fn user_of(&self, conn: ConnectionId) -> Option<UserId> {
        self.inner.read().await.connections.get(&conn).map(|e| e.user)
    }

    /// Returns `true` if `conn` is currently joined to `room`.
    ///
    /// This is the broadcast-path membership check; it reads the same state
    /// the mutation operations write, under the same lock.
    pub async fn is_joined(&self, conn: ConnectionId, room: RoomId) -> bool {
        self.inner
            .read()
            .await
            .rooms
            .get(&room)
            .is_some_and(|members| members.contains(&conn))
    }

    /// Returns a snapshot of the connections currently joined to `room`.
    pub async fn room_connections(&self, room: RoomId) -> Vec<ConnectionId> {
        self.inner
            .read()
            .await
            .rooms
            .get(&room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if `user` has at least one live connection.
    pub async fn is_online(&self, user: UserId) -> bool {
        self.inner.read().await.presence.is_online(user)
    }

    /// Returns every currently online user.
    pub async fn online_users(&self) -> Vec<UserId> {
        self.inner.read().await.presence.online_users()
    }

    /// Returns the number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admit_records_identity_with_empty_joined_set() {
        let registry = SessionRegistry::new();
        let conn = ConnectionId::new();
        let user = UserId::new();

        let transition = registry.admit(conn, user).await;
        assert_eq!(transition, PresenceTransition::NowOnline);
        assert_eq!(registry.user_of(conn).await, Some(user));
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let registry = SessionRegistry::new();
        let conn = ConnectionId::new();
        let room = RoomId::new();
        registry.admit(conn, UserId::new()).await;

        assert!(registry.join(conn, room).await);
        assert!(registry.join(conn, room).await);
        assert!(registry.is_joined(conn, room).await);
        assert_eq!(registry.room_connections(room).await.len(), 1);
    }

    #[tokio::test]
    async fn leave_unjoined_room_is_noop() {
        let registry = SessionRegistry::new();
        let conn = ConnectionId::new();
        registry.admit(conn, UserId::new()).await;

        assert!(registry.leave(conn, RoomId::new()).await);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn operations_on_unknown_connections_are_noops() {
        let registry = SessionRegistry::new();
        let conn = ConnectionId::new();
        let room = RoomId::new();

        assert!(!registry.join(conn, room).await);
        assert!(!registry.leave(conn, room).await);
        assert!(registry.remove(conn).await.is_none());
        assert!(!registry.is_joined(conn, room).await);
    }

    #[tokio::test]
    async fn fanout_set_reflects_last_join_or_leave() {
        let registry = SessionRegistry::new();
        let conn = ConnectionId::new();
        let room = RoomId::new();
        registry.admit(conn, UserId::new()).await;

        // Arbitrary join/leave sequence: membership equals the last action.
        registry.join(conn, room).await;
        registry.leave(conn, room).await;
        registry.join(conn, room).await;
        registry.join(conn, room).await;
        assert!(registry.is_joined(conn, room).await);

        registry.leave(conn, room).await;
        assert!(!registry.is_joined(conn, room).await);
        assert!(registry.room_connections(room).await.is_empty());
    }

    #[tokio::test]
    async fn remove_purges_every_joined_room() {
        let registry = SessionRegistry::new();
        let conn = ConnectionId::new();
        let user = UserId::new();
        let room_a = RoomId::new();
        let room_b = RoomId::new();
        registry.admit(conn, user).await;
        registry.join(conn, room_a).await;
        registry.join(conn, room_b).await;

        let removed = registry.remove(conn).await;
        let Some((removed_user, transition)) = removed else {
            panic!("expected removal to return the identity");
        };
        assert_eq!(removed_user, user);
        assert_eq!(transition, PresenceTransition::NowOffline);
        assert!(registry.room_connections(room_a).await.is_empty());
        assert!(registry.room_connections(room_b).await.is_empty());
        assert!(registry.user_of(conn).await.is_none());
    }

    #[tokio::test]
    async fn offline_fires_after_last_connection_only() {
        let registry = SessionRegistry::new();
        let user = UserId::new();
        let conns: Vec<ConnectionId> = (0..3).map(|_| ConnectionId::new()).collect();

        for (i, conn) in conns.iter().enumerate() {
            let transition = registry.admit(*conn, user).await;
            if i == 0 {
                assert_eq!(transition, PresenceTransition::NowOnline);
            } else {
                assert_eq!(transition, PresenceTransition::Unchanged);
            }
        }

        let mut offline_count = 0;
        for conn in &conns {
            let Some((_, transition)) = registry.remove(*conn).await else {
                panic!("connection should be known");
            };
            if transition == PresenceTransition::NowOffline {
                offline_count += 1;
            }
        }
        assert_eq!(offline_count, 1);
        assert!(!registry.is_online(user).await);
    }

    #[tokio::test]
    async fn duplicate_admit_leaves_state_untouched() {
        let registry = SessionRegistry::new();
        let conn = ConnectionId::new();
        let user = UserId::new();

        registry.admit(conn, user).await;
        let transition = registry.admit(conn, user).await;
        assert_eq!(transition, PresenceTransition::Unchanged);
        assert_eq!(registry.connection_count().await, 1);

        // One remove is enough to bring the user offline: the second admit
        // did not skew the presence count.
        let Some((_, transition)) = registry.remove(conn).await else {
            panic!("connection should be known");
        };
        assert_eq!(transition, PresenceTransition::NowOffline);
    }

    #[tokio::test]
    async fn two_connections_share_a_room() {
        let registry = SessionRegistry::new();
        let room = RoomId::new();
        let conn_a = ConnectionId::new();
        let conn_b = ConnectionId::new();
        registry.admit(conn_a, UserId::new()).await;
        registry.admit(conn_b, UserId::new()).await;
        registry.join(conn_a, room).await;
        registry.join(conn_b, room).await;

        let members = registry.room_connections(room).await;
        assert_eq!(members.len(), 2);
        assert!(members.contains(&conn_a));
        assert!(members.contains(&conn_b));

        registry.remove(conn_a).await;
        let members = registry.room_connections(room).await;
        assert_eq!(members, vec![conn_b]);
    }
}
