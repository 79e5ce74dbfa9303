//! Service layer: orchestration between collaborators and the domain.
//!
//! [`SessionService`] sequences connection lifecycle operations and
//! [`ChatService`] runs the message pipeline; both publish their events
//! through the shared [`crate::domain::EventBus`].

pub mod chat_service;
pub mod membership;
pub mod session_service;

pub use chat_service::ChatService;
pub use membership::MembershipAuthorizer;
pub use session_service::SessionService;
