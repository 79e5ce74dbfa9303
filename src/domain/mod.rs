//! Domain layer: identifiers, messages, events, and session state.
//!
//! This module contains the relay-side domain model: type-safe identifiers,
//! the message record shapes, the event bus for broadcasting state changes,
//! presence counting, and the session registry that keeps connection, room,
//! and presence views consistent.

pub mod event;
pub mod event_bus;
pub mod ids;
pub mod message;
pub mod presence;
pub mod session_registry;

pub use event::{EventPayload, RelayEvent};
pub use event_bus::EventBus;
pub use ids::{ConnectionId, EventId, MessageId, RoomId, UserId};
pub use message::{Message, MessageKind, MessageRecord, NewMessage, Sender};
pub use presence::PresenceTransition;
pub use session_registry::SessionRegistry;
