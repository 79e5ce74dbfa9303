//! WebSocket layer: connection handling, message framing, event delivery.
//!
//! The WebSocket endpoint at `/ws` carries the bidirectional event
//! vocabulary: room joins, message submission, typing signals, and the
//! filtered fanout of relay events to each connection.

pub mod connection;
pub mod handler;
pub mod messages;
