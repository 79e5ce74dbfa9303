//! # chat-relay
//!
//! Real-time group-messaging relay: authenticated clients open persistent
//! WebSocket connections, join logical rooms, exchange messages, and observe
//! presence and typing signals.
//!
//! This crate is the coordination layer that turns a set of independent,
//! unreliable, asynchronously-connecting clients into a consistent view of
//! who is online, who is in which room, and what was delivered where.
//! Durable storage of users/rooms/messages and credential issuance are
//! external collaborators behind the [`storage::ChatStore`] and
//! [`auth::TokenVerifier`] traits.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Connections (ws/)
//!     │
//!     ├── SessionService / ChatService (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── SessionRegistry + Presence (domain/)
//!     │
//!     └── PostgreSQL Storage (storage/)
//! ```
//!
//! The session registry, presence counts, and room fanout index form one
//! shared resource set mutated under a single lock, so a concurrent
//! broadcast can never observe them out of step.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod storage;
pub mod ws;
