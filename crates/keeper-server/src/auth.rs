use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use keeper_types::Credential;

use crate::error::{ServerError, ServerResult};

/// Turns a bearer token into the caller's raw public key.
///
/// Signature and freshness checks belong to the resolver; the ledger only
/// ever sees the resulting key bytes.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> ServerResult<Credential>;
}

/// Treats the bearer token itself as the hex-encoded public key.
///
/// For deployments where a fronting proxy already verified the request.
pub struct HexKeyResolver;

#[async_trait]
impl CredentialResolver for HexKeyResolver {
    async fn resolve(&self, token: &str) -> ServerResult<Credential> {
        Credential::from_hex(token).map_err(|e| ServerError::InvalidCredential(e.to_string()))
    }
}

/// The token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> ServerResult<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ServerError::Unauthenticated)
}
