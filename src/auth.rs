//! Authentication collaborator: bearer token to user identity.
//!
//! Credential issuance is owned by an external system; the relay only needs
//! to resolve a presented bearer token into a [`UserId`] or reject it. The
//! seam is the [`TokenVerifier`] trait so deployments can plug in their own
//! verifier. The shipped [`StaticTokenVerifier`] resolves tokens against a
//! table provisioned through configuration.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::UserId;
use crate::error::RelayError;

/// Resolves a bearer credential into an authenticated identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync + std::fmt::Debug {
    /// Verifies `token` and returns the identity it belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Unauthenticated`] for unknown or malformed
    /// tokens. Verification failures are connection-terminal for WebSocket
    /// clients and produce no response payload.
    async fn verify(&self, token: &str) -> Result<UserId, RelayError>;
}

/// Token table verifier backed by configuration.
///
/// Tokens are provisioned as `token:user-uuid` pairs in the
/// `RELAY_AUTH_TOKENS` environment variable (see [`crate::config`]).
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenVerifier {
    /// Creates a verifier over the given token table.
    #[must_use]
    pub fn new(tokens: HashMap<String, UserId>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<UserId, RelayError> {
        if token.is_empty() {
            return Err(RelayError::Unauthenticated("empty token".to_string()));
        }
        self.tokens
            .get(token)
            .copied()
            .ok_or_else(|| RelayError::Unauthenticated("unknown token".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_verifier() -> (StaticTokenVerifier, UserId) {
        let user = UserId::new();
        let mut tokens = HashMap::new();
        tokens.insert("valid-token".to_string(), user);
        (StaticTokenVerifier::new(tokens), user)
    }

    #[tokio::test]
    async fn known_token_resolves_identity() {
        let (verifier, user) = make_verifier();
        let resolved = verifier.verify("valid-token").await;
        let Ok(resolved) = resolved else {
            panic!("expected valid token to verify");
        };
        assert_eq!(resolved, user);
    }

    #[tokio::test]
    async fn unknown_token_is_unauthenticated() {
        let (verifier, _) = make_verifier();
        let result = verifier.verify("someone-elses-token").await;
        assert!(matches!(result, Err(RelayError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn empty_token_is_unauthenticated() {
        let (verifier, _) = make_verifier();
        let result = verifier.verify("").await;
        assert!(matches!(result, Err(RelayError::Unauthenticated(_))));
    }
}
