//! Membership authorization against the storage collaborator.

use std::sync::Arc;

use crate::domain::{RoomId, UserId};
use crate::error::RelayError;
use crate::storage::ChatStore;

/// Uncached membership check used before every privileged room operation.
///
/// Each call is a fresh read against storage; the result is never reused
/// across calls, even within one logical request, because membership can be
/// revoked concurrently (e.g. a leave-room racing a send from another
/// connection of the same user).
#[derive(Debug, Clone)]
pub struct MembershipAuthorizer {
    store: Arc<dyn ChatStore>,
}

impl MembershipAuthorizer {
    /// Creates an authorizer over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Returns `true` if `user` belongs to `room`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::StorageError`] on collaborator failure.
    pub async fn is_member(&self, user: UserId, room: RoomId) -> Result<bool, RelayError> {
        self.store.is_member(user, room).await
    }

    /// Fails with [`RelayError::Forbidden`] unless `user` belongs to `room`.
    ///
    /// Deliberately not a not-found error: the relay does not leak room
    /// existence to non-members.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Forbidden`] for non-members, or
    /// [`RelayError::StorageError`] on collaborator failure.
    pub async fn ensure_member(&self, user: UserId, room: RoomId) -> Result<(), RelayError> {
        if self.store.is_member(user, room).await? {
            Ok(())
        } else {
            Err(RelayError::Forbidden(
                "not a member of this room".to_string(),
            ))
        }
    }
}
