//! Presence tracking: live-connection reference counts per user.
//!
//! A user is online while at least one admitted connection carries their
//! identity. [`PresenceCounts`] owns the counts and reports the 0 to 1 and
//! 1 to 0 transitions; it holds no lock of its own because it lives inside
//! the session registry's critical section, keeping registry and presence
//! in lock-step.

use std::collections::HashMap;

use crate::error::RelayError;

use super::UserId;

/// Outcome of a presence count mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceTransition {
    /// Count went 0 to 1: the user is newly online.
    NowOnline,
    /// Count went 1 to 0: the user is newly offline.
    NowOffline,
    /// Count changed without crossing zero.
    Unchanged,
}

/// Per-user live connection counts.
#[derive(Debug, Default)]
pub struct PresenceCounts {
    counts: HashMap<UserId, usize>,
}

impl PresenceCounts {
    /// Creates an empty counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one more live connection for `user`.
    pub fn increment(&mut self, user: UserId) -> PresenceTransition {
        let count = self.counts.entry(user).or_insert(0);
        *count += 1;
        if *count == 1 {
            PresenceTransition::NowOnline
        } else {
            PresenceTransition::Unchanged
        }
    }

    /// Records one fewer live connection for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvariantViolation`] if the count would go
    /// negative. The count is clamped at zero; the caller logs the error
    /// and must not surface it to clients.
    pub fn decrement(&mut self, user: UserId) -> Result<PresenceTransition, RelayError> {
        match self.counts.get_mut(&user) {
            Some(count) if *count > 1 => {
                *count -= 1;
                Ok(PresenceTransition::Unchanged)
            }
            Some(_) => {
                self.counts.remove(&user);
                Ok(PresenceTransition::NowOffline)
            }
            None => Err(RelayError::InvariantViolation(format!(
                "presence decrement below zero for user {user}"
            ))),
        }
    }

    /// Returns the live connection count for `user`.
    #[must_use]
    pub fn count(&self, user: UserId) -> usize {
        self.counts.get(&user).copied().unwrap_or(0)
    }

    /// Returns `true` if `user` has at least one live connection.
    #[must_use]
    pub fn is_online(&self, user: UserId) -> bool {
        self.count(user) > 0
    }

    /// Returns every currently online user.
    #[must_use]
    pub fn online_users(&self) -> Vec<UserId> {
        self.counts.keys().copied().collect()
    }
}
