//! Bearer credential extractor for REST handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::RelayError;

/// Authenticated identity resolved from the `Authorization: Bearer` header.
///
/// Rejects with [`RelayError::Unauthenticated`] (401) when the header is
/// missing or the token does not verify; every REST endpoint goes through
/// this extractor, so the HTTP surface is consumed by the same identities
/// as the WebSocket one.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = RelayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| {
                RelayError::Unauthenticated("missing bearer credential".to_string())
            })?;

        let user = state.verifier.verify(token).await?;
        Ok(Self(user))
    }
}
