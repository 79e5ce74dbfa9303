//! Type-safe identifiers for the relay domain.
//!
//! Each identifier is a newtype wrapper around [`uuid::Uuid`] (v4) so that
//! connection, user, room, message, and event identifiers cannot be confused
//! with one another. [`ConnectionId`] and [`EventId`] are minted by the relay
//! for its process lifetime; [`UserId`], [`RoomId`], and [`MessageId`] are
//! owned by external collaborators and only carried here.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for one live transport-level session.
    ///
    /// Minted when a WebSocket connection is accepted; unique for the
    /// process lifetime and never persisted.
    ConnectionId
}

define_id! {
    /// Identity of an authenticated user.
    ///
    /// Owned by the authentication collaborator; the relay treats it as an
    /// opaque key and derives the online/offline projection itself.
    UserId
}

define_id! {
    /// Identifier of a logical room.
    ///
    /// Rooms and their membership are owned by the storage collaborator.
    RoomId
}

define_id! {
    /// Identifier of a persisted message, assigned by storage on insert.
    MessageId
}

define_id! {
    /// Identifier of one logical relay event.
    ///
    /// Generated once per [`crate::domain::RelayEvent`] and used by the
    /// per-connection delivery filter to enforce exactly-once delivery.
    EventId
}
