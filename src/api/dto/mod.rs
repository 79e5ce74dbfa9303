//! Request/response DTO types for the REST API.

pub mod message_dto;

pub use message_dto::{EditMessageRequest, SendMessageRequest};
